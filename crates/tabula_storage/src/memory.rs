//! In-memory storage backend for testing.

use crate::backend::{DirEntry, StorageBackend};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// An in-memory storage backend.
///
/// Files live in a map keyed by path, directories in a set. Parent
/// directories must exist before a file is written, as on a real file
/// system.
///
/// Every trait call increments [`op_count`](Self::op_count), which lets
/// tests assert that an operation performed no I/O at all.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use tabula_storage::{InMemoryBackend, StorageBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.create_dir_all(Path::new("/db")).unwrap();
/// backend.append(Path::new("/db/.idxlog"), b"+User:Name:Ann=1\n").unwrap();
/// assert_eq!(backend.op_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: RwLock<BTreeSet<PathBuf>>,
    ops: AtomicUsize,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many backend calls have been made so far.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.load(Ordering::SeqCst)
    }

    /// Returns the paths of all stored files.
    #[must_use]
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }

    fn tick(&self) {
        self.ops.fetch_add(1, Ordering::SeqCst);
    }

    fn require_parent(&self, path: &Path) -> StorageResult<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                if self.dirs.read().contains(parent) {
                    Ok(())
                } else {
                    Err(StorageError::not_found(parent))
                }
            }
            _ => Ok(()),
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        self.tick();
        if self.dirs.read().contains(path) {
            return Err(StorageError::WrongKind {
                path: path.to_path_buf(),
                expected: "file",
            });
        }
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::not_found(path))
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        self.tick();
        self.require_parent(path)?;
        self.files.write().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn append(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        self.tick();
        self.require_parent(path)?;
        self.files
            .write()
            .entry(path.to_path_buf())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        self.tick();
        self.files
            .write()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(path))
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        self.tick();
        Ok(self.files.read().contains_key(path) || self.dirs.read().contains(path))
    }

    fn is_dir(&self, path: &Path) -> StorageResult<bool> {
        self.tick();
        Ok(self.dirs.read().contains(path))
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.tick();
        let mut dirs = self.dirs.write();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn list(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        self.tick();
        if !self.dirs.read().contains(path) {
            return Err(StorageError::not_found(path));
        }

        let child_name = |child: &Path| -> Option<String> {
            if child.parent() == Some(path) {
                child.file_name().map(|n| n.to_string_lossy().into_owned())
            } else {
                None
            }
        };

        let mut entries: Vec<DirEntry> = self
            .dirs
            .read()
            .iter()
            .filter_map(|d| child_name(d))
            .map(|name| DirEntry { name, is_dir: true })
            .collect();
        entries.extend(
            self.files
                .read()
                .keys()
                .filter_map(|f| child_name(f))
                .map(|name| DirEntry {
                    name,
                    is_dir: false,
                }),
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_requires_parent_directory() {
        let backend = InMemoryBackend::new();

        let err = backend
            .write(Path::new("/db/User/0000001"), b"x")
            .unwrap_err();
        assert!(err.is_not_found());

        backend.create_dir_all(Path::new("/db/User")).unwrap();
        backend.write(Path::new("/db/User/0000001"), b"x").unwrap();
        assert_eq!(backend.read(Path::new("/db/User/0000001")).unwrap(), b"x");
    }

    #[test]
    fn create_dir_all_registers_ancestors() {
        let backend = InMemoryBackend::new();
        backend
            .create_dir_all(Path::new("/db/User/metadata"))
            .unwrap();

        assert!(backend.is_dir(Path::new("/db")).unwrap());
        assert!(backend.is_dir(Path::new("/db/User")).unwrap());
        assert!(backend.is_dir(Path::new("/db/User/metadata")).unwrap());
    }

    #[test]
    fn list_direct_children_only() {
        let backend = InMemoryBackend::new();
        backend
            .create_dir_all(Path::new("/db/User/metadata"))
            .unwrap();
        backend.write(Path::new("/db/User/0000001"), b"a").unwrap();
        backend
            .write(Path::new("/db/User/metadata/counter"), b"1")
            .unwrap();

        let mut entries = backend.list(Path::new("/db/User")).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "0000001");
        assert!(!entries[0].is_dir);
        assert_eq!(entries[1].name, "metadata");
        assert!(entries[1].is_dir);
    }

    #[test]
    fn remove_missing_file() {
        let backend = InMemoryBackend::new();
        assert!(backend
            .remove(Path::new("/db/nothing"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn op_count_tracks_calls() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.op_count(), 0);

        let _ = backend.exists(Path::new("/db"));
        let _ = backend.read(Path::new("/db/x"));

        assert_eq!(backend.op_count(), 2);
    }
}
