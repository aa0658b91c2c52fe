//! User-facing run signals.

use serde::Serialize;

/// Something a front end should tell the user about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Started,
    Succeeded {
        written: usize,
        deleted: usize,
        failed: usize,
    },
    Failed {
        error: String,
    },
}

impl SyncEvent {
    /// Short message suitable for a notice or a terminal line.
    pub fn message(&self) -> String {
        match self {
            Self::Started => "Syncing memos...".to_string(),
            Self::Succeeded {
                written,
                deleted,
                failed: 0,
            } => format!("Memos synced ({written} written, {deleted} deleted)"),
            Self::Succeeded {
                written,
                deleted,
                failed,
            } => format!(
                "Memos synced with {failed} failed entries ({written} written, {deleted} deleted)"
            ),
            Self::Failed { error } => {
                format!("Sync failed, check your authorization and network: {error}")
            }
        }
    }
}

/// Receives run events.
pub trait SyncNotifier: Send + Sync {
    fn notify(&self, event: &SyncEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl SyncNotifier for LogNotifier {
    fn notify(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Failed { .. } => tracing::warn!("{}", event.message()),
            _ => tracing::info!("{}", event.message()),
        }
    }
}
