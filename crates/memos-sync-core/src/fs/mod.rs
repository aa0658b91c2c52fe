//! Filesystem capability used by the sync engine.
//!
//! All paths are vault-relative and `/`-separated. Implementations decide
//! where the vault lives.

mod local;
mod memory;

use std::future::Future;

use crate::error::Result;
use crate::reconcile::{ancestor_dirs, LocalState};

pub use local::LocalFilesystem;
pub use memory::MemoryFilesystem;

/// Direct children of a directory, as vault paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub files: Vec<String>,
    pub folders: Vec<String>,
}

/// Host filesystem operations the engine needs.
pub trait FilesystemCapability: Send + Sync {
    fn exists(&self, path: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Non-recursive listing of `dir`.
    fn list(&self, dir: &str) -> impl Future<Output = Result<Listing>> + Send;

    fn read(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    fn write(&self, path: &str, content: &str) -> impl Future<Output = Result<()>> + Send;

    fn write_binary(&self, path: &str, content: &[u8]) -> impl Future<Output = Result<()>> + Send;

    fn remove(&self, path: &str) -> impl Future<Output = Result<()>> + Send;

    /// Create `path`; parents must already exist.
    fn create_folder(&self, path: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Walk `root` and collect every file and directory below it.
///
/// A missing root yields an empty state. When the root exists it is recorded
/// together with its ancestors.
pub async fn scan_collection<F: FilesystemCapability>(fs: &F, root: &str) -> Result<LocalState> {
    let mut state = LocalState::default();
    if !fs.exists(root).await? {
        return Ok(state);
    }

    state.dirs.extend(ancestor_dirs(root));
    state.dirs.insert(root.to_string());

    let mut pending = vec![root.to_string()];
    while let Some(dir) = pending.pop() {
        let listing = fs.list(&dir).await?;
        state.files.extend(listing.files);
        for folder in listing.folders {
            if state.dirs.insert(folder.clone()) {
                pending.push(folder);
            }
        }
    }

    tracing::debug!(
        "Scanned {}: {} files, {} directories",
        root,
        state.files.len(),
        state.dirs.len()
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn scan_missing_root_is_empty() {
        let fs = MemoryFilesystem::new();
        let state = scan_collection(&fs, "sync/resources").await.unwrap();
        assert_eq!(state, LocalState::default());
    }

    #[tokio::test]
    async fn scan_collects_nested_files_and_dirs() {
        let fs = MemoryFilesystem::new();
        fs.insert_file("sync/resources/a.png", b"a");
        fs.insert_file("sync/resources/sub/dir/b.png", b"b");
        fs.insert_file("sync/memos/c.md", b"c");

        let state = scan_collection(&fs, "sync/resources").await.unwrap();
        assert_eq!(
            state.files.into_iter().collect::<Vec<_>>(),
            vec!["sync/resources/a.png", "sync/resources/sub/dir/b.png"]
        );
        assert_eq!(
            state.dirs.into_iter().collect::<Vec<_>>(),
            vec![
                "sync",
                "sync/resources",
                "sync/resources/sub",
                "sync/resources/sub/dir"
            ]
        );
    }
}
