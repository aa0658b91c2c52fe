//! Persistence for the settings blob.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::SyncSettings;

/// Where settings are loaded from and saved to.
pub trait SettingsStore: Send + Sync {
    /// Load settings, merged over defaults.
    fn load(&self) -> impl Future<Output = Result<SyncSettings>> + Send;

    /// Persist settings.
    fn save(&self, settings: &SyncSettings) -> impl Future<Output = Result<()>> + Send;
}

/// Settings stored as pretty-printed JSON in a single file.
///
/// A missing file loads as `SyncSettings::default()`.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    async fn load(&self) -> Result<SyncSettings> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {}, using defaults", self.path.display());
                return Ok(SyncSettings::default());
            }
            Err(error) => return Err(error.into()),
        };

        if raw.trim().is_empty() {
            return Ok(SyncSettings::default());
        }

        serde_json::from_str(&raw).map_err(|error| {
            Error::InvalidConfig(format!(
                "Failed to parse settings at {}: {error}",
                self.path.display()
            ))
        })
    }

    async fn save(&self, settings: &SyncSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let serialized = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, serialized).await?;
        Ok(())
    }
}

/// Settings held in memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<SyncSettings>,
}

impl MemorySettingsStore {
    pub const fn new(settings: SyncSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    /// Current settings value.
    pub fn snapshot(&self) -> SyncSettings {
        self.settings
            .lock()
            .map(|settings| settings.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<SyncSettings> {
        Ok(self.snapshot())
    }

    async fn save(&self, settings: &SyncSettings) -> Result<()> {
        let mut guard = self
            .settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = settings.clone();
        Ok(())
    }
}
