//! Runner state shared with front ends.

use serde::Serialize;

/// Where the runner is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Synced,
    Failed,
}
