//! Persisted sync settings model

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sync intervals (minutes) offered to users; `0` disables periodic sync.
pub const ALLOWED_INTERVALS: [u32; 6] = [0, 5, 15, 30, 60, 120];

/// How memo file names are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileNameFormat {
    /// Creation time, `YYYY-M-D-H-MM.md`
    CreatedAt,
    /// Last update time, `YYYY-M-D-H-MM.md`
    UpdatedAt,
    /// `<title>.md`
    Title,
    /// `<id>.md`; unknown values fall back here, so it stays last
    #[default]
    #[serde(other)]
    Id,
}

impl FileNameFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Title => "title",
        }
    }
}

/// Credentials for the remote server
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Authorization {
    /// Server base URL, e.g. `https://memos.example.com`
    pub base_url: String,
    /// Access token sent as a bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Legacy per-user open ID passed as a query parameter
    #[serde(skip_serializing_if = "Option::is_none", alias = "apiKey")]
    pub open_id: Option<String>,
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        formatter
            .debug_struct("Authorization")
            .field("base_url", &self.base_url)
            .field("access_token", &redact(&self.access_token))
            .field("open_id", &redact(&self.open_id))
            .finish()
    }
}

/// Settings blob persisted between runs.
///
/// Every field has a default, so partial or empty blobs load without error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub authorization: Authorization,
    /// Vault folder that receives `memos/` and `resources/`
    pub folder_to_sync: String,
    pub file_name_format: FileNameFormat,
    /// Minutes between periodic syncs, `0` disables the timer
    pub interval: u32,
    /// Watermark of the last successful sync (Unix ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<i64>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            authorization: Authorization::default(),
            folder_to_sync: "Memos Sync".to_string(),
            file_name_format: FileNameFormat::Id,
            interval: 0,
            last_sync_time: None,
        }
    }
}

impl SyncSettings {
    /// Periodic sync interval, `None` when disabled.
    #[must_use]
    pub fn sync_interval(&self) -> Option<Duration> {
        (self.interval > 0).then(|| Duration::from_secs(u64::from(self.interval) * 60))
    }
}
