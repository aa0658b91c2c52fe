use std::path::Path;

use memos_sync_core::config::SyncConfig;
use memos_sync_core::models::ALLOWED_INTERVALS;
use memos_sync_core::util::{is_http_url, normalize_text_option};
use memos_sync_core::{FileNameFormat, JsonSettingsStore, SettingsStore, SyncSettings};

use crate::cli::ConfigCommands;
use crate::commands::common::format_watermark;
use crate::error::CliError;

const REDACTED: &str = "[REDACTED]";

/// Requested edits; `None` keeps the current value.
#[derive(Debug, Default)]
pub struct SettingsUpdate {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub open_id: Option<String>,
    pub folder: Option<String>,
    pub format: Option<FileNameFormat>,
    pub interval: Option<u32>,
}

impl SettingsUpdate {
    const fn is_empty(&self) -> bool {
        self.base_url.is_none()
            && self.access_token.is_none()
            && self.open_id.is_none()
            && self.folder.is_none()
            && self.format.is_none()
            && self.interval.is_none()
    }
}

pub async fn run_config(command: ConfigCommands, settings_path: &Path) -> Result<(), CliError> {
    let store = JsonSettingsStore::new(settings_path);
    match command {
        ConfigCommands::Show { json } => {
            let settings = redact_settings(store.load().await?);
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                println!("Settings file: {}", settings_path.display());
                for line in format_settings_lines(&settings) {
                    println!("{line}");
                }
            }
        }
        ConfigCommands::Set {
            base_url,
            access_token,
            open_id,
            folder,
            format,
            interval,
        } => {
            let update = SettingsUpdate {
                base_url,
                access_token,
                open_id,
                folder,
                format: format.map(FileNameFormat::from),
                interval,
            };
            if update.is_empty() {
                return Err(CliError::Config(
                    "Nothing to update. Pass at least one option to `config set`.".to_string(),
                ));
            }

            let mut settings = store.load().await?;
            apply_settings_update(&mut settings, update)?;
            store.save(&settings).await?;
            println!("Saved settings to {}", settings_path.display());
        }
        ConfigCommands::ResetWatermark => {
            let mut settings = store.load().await?;
            settings.last_sync_time = None;
            store.save(&settings).await?;
            println!("Cleared last sync time; the next sync rewrites every memo");
        }
    }
    Ok(())
}

pub fn apply_settings_update(
    settings: &mut SyncSettings,
    update: SettingsUpdate,
) -> Result<(), CliError> {
    if let Some(base_url) = update.base_url {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !is_http_url(&base_url) {
            return Err(CliError::Config(
                "Base URL must include http:// or https://".to_string(),
            ));
        }
        settings.authorization.base_url = base_url;
    }
    if let Some(access_token) = update.access_token {
        settings.authorization.access_token = normalize_text_option(Some(access_token));
    }
    if let Some(open_id) = update.open_id {
        settings.authorization.open_id = normalize_text_option(Some(open_id));
    }
    if let Some(folder) = update.folder {
        let folder = folder.trim().to_string();
        SyncConfig::new(&folder, settings.file_name_format)?;
        settings.folder_to_sync = folder;
    }
    if let Some(format) = update.format {
        settings.file_name_format = format;
    }
    if let Some(interval) = update.interval {
        if !ALLOWED_INTERVALS.contains(&interval) {
            return Err(CliError::Config(format!(
                "Interval must be one of {ALLOWED_INTERVALS:?} minutes"
            )));
        }
        settings.interval = interval;
    }
    Ok(())
}

pub fn redact_settings(mut settings: SyncSettings) -> SyncSettings {
    let redact = |value: &mut Option<String>| {
        if value.is_some() {
            *value = Some(REDACTED.to_string());
        }
    };
    redact(&mut settings.authorization.access_token);
    redact(&mut settings.authorization.open_id);
    settings
}

pub fn format_settings_lines(settings: &SyncSettings) -> Vec<String> {
    let or_unset = |value: Option<&str>| value.unwrap_or("(not set)").to_string();
    let base_url = Some(settings.authorization.base_url.as_str()).filter(|url| !url.is_empty());
    let interval = if settings.interval == 0 {
        "disabled".to_string()
    } else {
        format!("{} minutes", settings.interval)
    };

    vec![
        format!("Base URL:      {}", or_unset(base_url)),
        format!(
            "Access token:  {}",
            or_unset(settings.authorization.access_token.as_deref())
        ),
        format!(
            "Open ID:       {}",
            or_unset(settings.authorization.open_id.as_deref())
        ),
        format!("Folder:        {}", settings.folder_to_sync),
        format!("File names:    {}", settings.file_name_format.as_str()),
        format!("Interval:      {interval}"),
        format!("Last sync:     {}", format_watermark(settings.last_sync_time)),
    ]
}
