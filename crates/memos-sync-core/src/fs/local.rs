//! `FilesystemCapability` backed by a directory on disk.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::util::join_vault_path;

use super::{FilesystemCapability, Listing};

/// A vault rooted at a local directory.
///
/// Vault paths are confined to the root: absolute paths and `.`/`..`
/// segments are rejected with `Error::InvalidPath`.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    root: PathBuf,
}

impl LocalFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.starts_with('/') || path.contains('\\') {
            return Err(Error::InvalidPath(path.to_string()));
        }

        let mut resolved = self.root.clone();
        for segment in path.split('/') {
            match segment {
                "" => {}
                "." | ".." => return Err(Error::InvalidPath(path.to_string())),
                segment if segment.contains(':') && cfg!(windows) => {
                    return Err(Error::InvalidPath(path.to_string()));
                }
                segment => resolved.push(segment),
            }
        }
        Ok(resolved)
    }
}

impl FilesystemCapability for LocalFilesystem {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)?).await?)
    }

    async fn list(&self, dir: &str) -> Result<Listing> {
        let mut entries = tokio::fs::read_dir(self.resolve(dir)?).await?;
        let mut listing = Listing::default();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!("Skipping non UTF-8 entry in {}", dir);
                continue;
            };
            let path = join_vault_path(dir, &name);
            if entry.file_type().await?.is_dir() {
                listing.folders.push(path);
            } else {
                listing.files.push(path);
            }
        }

        listing.files.sort();
        listing.folders.sort();
        Ok(listing)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.resolve(path)?).await?)
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        Ok(tokio::fs::write(self.resolve(path)?, content).await?)
    }

    async fn write_binary(&self, path: &str, content: &[u8]) -> Result<()> {
        Ok(tokio::fs::write(self.resolve(path)?, content).await?)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        Ok(tokio::fs::remove_file(self.resolve(path)?).await?)
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        match tokio::fs::create_dir(self.resolve(path)?).await {
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            result => Ok(result?),
        }
    }
}
