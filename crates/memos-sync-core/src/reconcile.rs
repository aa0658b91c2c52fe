//! Reconciliation of a normalized snapshot against the local vault.
//!
//! Each collection (`memos/` and `resources/`) is planned on its own:
//!
//! - memos are rewritten unless the watermark proves they did not change,
//! - resources are written once and never overwritten,
//! - every local file under the collection root that the snapshot does not
//!   mention is deleted.
//!
//! The retained set is the full normalized set, so a skipped write still
//! protects its file from deletion. A path is therefore either written,
//! skipped, or deleted, never two of these.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::config::SyncConfig;
use crate::normalize::{NormalizedEntry, NormalizedSnapshot};

/// The two independently reconciled collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Notes,
    Attachments,
}

impl Collection {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Attachments => "attachments",
        }
    }
}

/// Why an entry was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Memo updated before the last sync watermark.
    UnchangedSinceWatermark,
    /// Resource already present locally.
    AlreadyPresent,
    /// Resource download failed upstream.
    ContentUnavailable,
}

/// Files and directories currently under a collection root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    pub files: BTreeSet<String>,
    pub dirs: BTreeSet<String>,
}

impl LocalState {
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            dirs: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dirs.extend(dirs.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedWrite {
    pub path: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedWrite {
    pub path: String,
    pub reason: SkipReason,
}

/// Work needed to bring one collection in line with the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPlan {
    pub collection: Collection,
    /// Vault-relative collection root, e.g. `Memos Sync/memos`.
    pub root: String,
    /// Directories to create before writing, root to leaf.
    pub create_dirs: Vec<String>,
    pub writes: Vec<PlannedWrite>,
    pub skipped_writes: Vec<SkippedWrite>,
    /// Local files to remove, sorted.
    pub deletes: Vec<String>,
}

impl CollectionPlan {
    fn empty(collection: Collection, root: &str) -> Self {
        Self {
            collection,
            root: root.to_string(),
            create_dirs: Vec::new(),
            writes: Vec::new(),
            skipped_writes: Vec::new(),
            deletes: Vec::new(),
        }
    }

    /// Whether executing the plan would change anything on disk.
    pub fn is_noop(&self) -> bool {
        self.create_dirs.is_empty() && self.writes.is_empty() && self.deletes.is_empty()
    }

    pub fn write_paths(&self) -> impl Iterator<Item = &str> {
        self.writes.iter().map(|write| write.path.as_str())
    }

    pub fn skipped_paths(&self) -> impl Iterator<Item = &str> {
        self.skipped_writes.iter().map(|skip| skip.path.as_str())
    }
}

/// Plans for both collections of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub notes: CollectionPlan,
    pub attachments: CollectionPlan,
}

impl ReconciliationPlan {
    pub fn is_noop(&self) -> bool {
        self.notes.is_noop() && self.attachments.is_noop()
    }
}

#[derive(Debug, Clone, Copy)]
enum WritePolicy {
    Watermark(Option<i64>),
    WriteOnce,
}

/// Compute the plan for both collections.
pub fn reconcile(
    config: &SyncConfig,
    snapshot: &NormalizedSnapshot,
    local_notes: &LocalState,
    local_attachments: &LocalState,
) -> ReconciliationPlan {
    let notes = reconcile_collection(
        Collection::Notes,
        &config.memos_root(),
        &snapshot.notes,
        local_notes,
        WritePolicy::Watermark(config.watermark()),
    );
    let attachments = reconcile_collection(
        Collection::Attachments,
        &config.resources_root(),
        &snapshot.attachments,
        local_attachments,
        WritePolicy::WriteOnce,
    );

    tracing::debug!(
        "Planned notes: {} writes, {} skipped, {} deletes; attachments: {} writes, {} skipped, {} deletes",
        notes.writes.len(),
        notes.skipped_writes.len(),
        notes.deletes.len(),
        attachments.writes.len(),
        attachments.skipped_writes.len(),
        attachments.deletes.len()
    );

    ReconciliationPlan { notes, attachments }
}

fn reconcile_collection(
    collection: Collection,
    root: &str,
    entries: &[NormalizedEntry],
    local: &LocalState,
    policy: WritePolicy,
) -> CollectionPlan {
    let mut plan = CollectionPlan::empty(collection, root);

    // Later entries win when two remote items map to the same path.
    let mut order = Vec::new();
    let mut latest: HashMap<&str, &NormalizedEntry> = HashMap::new();
    for entry in entries {
        let path = entry.relative_path.as_str();
        if latest.insert(path, entry).is_some() {
            tracing::warn!(
                "Multiple remote {} map to {}, keeping the last one",
                collection.label(),
                path
            );
        } else {
            order.push(path);
        }
    }

    let mut pending_dirs = BTreeSet::new();
    for path in order {
        let entry = latest[path];
        match decide(entry, local, policy) {
            Ok(content) => {
                for dir in ancestor_dirs(path) {
                    if !local.dirs.contains(&dir) && pending_dirs.insert(dir.clone()) {
                        plan.create_dirs.push(dir);
                    }
                }
                plan.writes.push(PlannedWrite {
                    path: path.to_string(),
                    content,
                });
            }
            Err(reason) => plan.skipped_writes.push(SkippedWrite {
                path: path.to_string(),
                reason,
            }),
        }
    }
    // Ancestors sort before descendants, which keeps root-to-leaf order.
    plan.create_dirs.sort();

    let prefix = format!("{root}/");
    plan.deletes = local
        .files
        .iter()
        .filter(|path| path.starts_with(&prefix) && !latest.contains_key(path.as_str()))
        .cloned()
        .collect();

    plan
}

fn decide(
    entry: &NormalizedEntry,
    local: &LocalState,
    policy: WritePolicy,
) -> Result<Vec<u8>, SkipReason> {
    let Some(content) = entry.content.as_ref() else {
        return Err(SkipReason::ContentUnavailable);
    };

    match policy {
        WritePolicy::Watermark(Some(watermark)) => match entry.remote_updated_at {
            Some(updated_at) if updated_at.saturating_mul(1000) < watermark => {
                Err(SkipReason::UnchangedSinceWatermark)
            }
            _ => Ok(content.clone()),
        },
        WritePolicy::Watermark(None) => Ok(content.clone()),
        WritePolicy::WriteOnce if local.files.contains(&entry.relative_path) => {
            Err(SkipReason::AlreadyPresent)
        }
        WritePolicy::WriteOnce => Ok(content.clone()),
    }
}

/// Every ancestor directory of `path`, shortest first.
pub fn ancestor_dirs(path: &str) -> Vec<String> {
    let mut dirs = Vec::new();
    let mut end = 0;
    while let Some(offset) = path[end..].find('/') {
        end += offset;
        if end > 0 {
            dirs.push(path[..end].to_string());
        }
        end += 1;
    }
    dirs
}
