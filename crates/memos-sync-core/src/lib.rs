//! memos-sync-core - Core library for memos-sync
//!
//! Mirrors the memos and resources of a Memos server into a local folder.
//! A run normalizes the remote snapshot into vault paths, reconciles it
//! against what is on disk, and executes the resulting plan through a
//! filesystem capability.

pub mod config;
pub mod error;
pub mod executor;
pub mod fs;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod remote;
pub mod render;
pub mod scheduler;
pub mod state;
pub mod sync;
pub mod util;

pub use config::{Credentials, JsonSettingsStore, SettingsStore, SyncConfig};
pub use error::{Error, Result};
pub use executor::{execute_plan, ExecutionReport};
pub use fs::{FilesystemCapability, LocalFilesystem};
pub use models::{FileNameFormat, RemoteAttachment, RemoteNote, RemoteSnapshot, SyncSettings};
pub use normalize::{normalize_snapshot, NormalizedEntry, NormalizedSnapshot};
pub use reconcile::{reconcile, LocalState, ReconciliationPlan};
pub use remote::{fetch_snapshot, MemosClient, RemoteCapability, RemoteListing, ResourceRef};
pub use scheduler::SyncScheduler;
pub use state::SyncState;
pub use sync::{SyncEvent, SyncNotifier, SyncOutcome, SyncReport, SyncRunner};
