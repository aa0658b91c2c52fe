//! Validated run configuration.
//!
//! `SyncSettings` is what gets persisted; it may be partial or wrong. Before a
//! run touches the network or the filesystem the settings are turned into a
//! `SyncConfig` and `Credentials`, and any problem surfaces as
//! `Error::InvalidConfig`.

mod store;

use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{Authorization, FileNameFormat, SyncSettings};
use crate::util::{is_http_url, join_vault_path, normalize_text_option};

pub use store::{JsonSettingsStore, MemorySettingsStore, SettingsStore};

/// Name of the note collection directory inside the sync folder.
pub const MEMOS_DIR: &str = "memos";
/// Name of the attachment collection directory inside the sync folder.
pub const RESOURCES_DIR: &str = "resources";

/// Configuration for one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    folder: String,
    file_name_format: FileNameFormat,
    interval: Option<Duration>,
    watermark: Option<i64>,
}

impl SyncConfig {
    /// Create a config for `folder`, rejecting empty or escaping folder names.
    pub fn new(folder: &str, file_name_format: FileNameFormat) -> Result<Self> {
        Ok(Self {
            folder: normalize_folder(folder)?,
            file_name_format,
            interval: None,
            watermark: None,
        })
    }

    pub fn from_settings(settings: &SyncSettings) -> Result<Self> {
        Ok(Self::new(&settings.folder_to_sync, settings.file_name_format)?
            .with_interval(settings.sync_interval())
            .with_watermark(settings.last_sync_time))
    }

    #[must_use]
    pub const fn with_watermark(mut self, watermark: Option<i64>) -> Self {
        self.watermark = watermark;
        self
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Option<Duration>) -> Self {
        self.interval = interval;
        self
    }

    /// Vault-relative sync folder, without leading or trailing slashes.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub const fn file_name_format(&self) -> FileNameFormat {
        self.file_name_format
    }

    /// Scheduler period; `None` when periodic sync is disabled.
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Last successful sync (Unix ms); `None` forces a full sync.
    pub const fn watermark(&self) -> Option<i64> {
        self.watermark
    }

    pub fn memos_root(&self) -> String {
        join_vault_path(&self.folder, MEMOS_DIR)
    }

    pub fn resources_root(&self) -> String {
        join_vault_path(&self.folder, RESOURCES_DIR)
    }
}

/// How requests authenticate against the server.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <token>`
    AccessToken(String),
    /// `?openId=<id>` on every request
    OpenId(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessToken(_) => formatter.write_str("AccessToken([REDACTED])"),
            Self::OpenId(_) => formatter.write_str("OpenId([REDACTED])"),
        }
    }
}

/// Validated server endpoint and credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub credential: Credential,
}

impl Credentials {
    /// Validate the authorization block of the settings.
    ///
    /// An access token wins over an open ID when both are present.
    pub fn from_authorization(authorization: &Authorization) -> Result<Self> {
        let base_url = normalize_text_option(Some(authorization.base_url.clone()))
            .ok_or_else(|| Error::InvalidConfig("base URL is not set".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::InvalidConfig(
                "base URL must include http:// or https://".to_string(),
            ));
        }

        let credential = if let Some(token) = normalize_text_option(authorization.access_token.clone())
        {
            Credential::AccessToken(token)
        } else if let Some(open_id) = normalize_text_option(authorization.open_id.clone()) {
            Credential::OpenId(open_id)
        } else {
            return Err(Error::InvalidConfig(
                "an access token or open ID is required".to_string(),
            ));
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        })
    }
}

fn normalize_folder(raw: &str) -> Result<String> {
    let segments = raw
        .trim()
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();

    if segments.is_empty() {
        return Err(Error::InvalidConfig(
            "folder to sync must not be empty".to_string(),
        ));
    }
    if segments.iter().any(|segment| matches!(*segment, "." | "..")) {
        return Err(Error::InvalidConfig(format!(
            "folder to sync must stay inside the vault: {raw}"
        )));
    }

    Ok(segments.join("/"))
}
