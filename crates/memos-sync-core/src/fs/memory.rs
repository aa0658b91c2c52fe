//! In-memory `FilesystemCapability`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::reconcile::ancestor_dirs;

use super::{FilesystemCapability, Listing};

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    failing: BTreeSet<String>,
    writes: usize,
}

/// A vault kept entirely in memory.
///
/// Behaves like a strict host filesystem: writing requires the parent
/// directory to exist. Paths registered with [`Self::fail_on`] make every
/// mutating operation on them fail.
#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    state: Mutex<MemoryState>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, creating its ancestors.
    pub fn insert_file(&self, path: &str, content: &[u8]) {
        let mut state = self.lock();
        state.dirs.extend(ancestor_dirs(path));
        state.files.insert(path.to_string(), content.to_vec());
    }

    /// Make writes, removals and folder creation on `path` fail.
    pub fn fail_on(&self, path: &str) {
        self.lock().failing.insert(path.to_string());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    /// Every file with its contents.
    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        self.lock().files.clone()
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().dirs.contains(path)
    }

    /// Number of successful `write`/`write_binary` calls so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, path: &str, content: Vec<u8>) -> Result<()> {
        let mut state = self.lock();
        check_writable(&state, path)?;
        if let Some(parent) = ancestor_dirs(path).pop() {
            if !state.dirs.contains(&parent) {
                return Err(Error::NotFound(parent));
            }
        }
        state.files.insert(path.to_string(), content);
        state.writes += 1;
        Ok(())
    }
}

fn check_writable(state: &MemoryState, path: &str) -> Result<()> {
    if state.failing.contains(path) {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("injected failure for {path}"),
        )));
    }
    Ok(())
}

fn is_direct_child(parent: &str, path: &str) -> bool {
    let rest = if parent.is_empty() {
        Some(path)
    } else {
        path.strip_prefix(parent)
            .and_then(|rest| rest.strip_prefix('/'))
    };
    rest.is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
}

impl FilesystemCapability for MemoryFilesystem {
    async fn exists(&self, path: &str) -> Result<bool> {
        let state = self.lock();
        Ok(path.is_empty() || state.files.contains_key(path) || state.dirs.contains(path))
    }

    async fn list(&self, dir: &str) -> Result<Listing> {
        let state = self.lock();
        if !dir.is_empty() && !state.dirs.contains(dir) {
            return Err(Error::NotFound(dir.to_string()));
        }
        Ok(Listing {
            files: state
                .files
                .keys()
                .filter(|path| is_direct_child(dir, path))
                .cloned()
                .collect(),
            folders: state
                .dirs
                .iter()
                .filter(|path| is_direct_child(dir, path))
                .cloned()
                .collect(),
        })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        self.store(path, content.as_bytes().to_vec())
    }

    async fn write_binary(&self, path: &str, content: &[u8]) -> Result<()> {
        self.store(path, content.to_vec())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let mut state = self.lock();
        check_writable(&state, path)?;
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        let mut state = self.lock();
        check_writable(&state, path)?;
        if let Some(parent) = ancestor_dirs(path).pop() {
            if !state.dirs.contains(&parent) {
                return Err(Error::NotFound(parent));
            }
        }
        state.dirs.insert(path.to_string());
        Ok(())
    }
}
