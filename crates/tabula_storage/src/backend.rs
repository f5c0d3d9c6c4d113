//! Storage backend trait definition.

use crate::error::StorageResult;
use std::path::Path;
use std::sync::Arc;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name of the entry (last path component).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// A path-addressed storage backend for tabula.
///
/// # Invariants
///
/// - `write` replaces the whole file; readers never observe a partial write
/// - `append` opens, appends and closes; no handle outlives the call
/// - `read` of a missing file fails with [`StorageError::NotFound`]
/// - Backends must be `Send + Sync` so a `Database` can be shared
///
/// [`StorageError::NotFound`]: crate::StorageError::NotFound
pub trait StorageBackend: Send + Sync {
    /// Reads the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist, or an I/O error.
    fn read(&self, path: &Path) -> StorageResult<Vec<u8>>;

    /// Replaces the file at `path` with `data`.
    ///
    /// The parent directory must already exist.
    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()>;

    /// Appends `data` to the file at `path`, creating it if missing.
    fn append(&self, path: &Path, data: &[u8]) -> StorageResult<()>;

    /// Removes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn remove(&self, path: &Path) -> StorageResult<()>;

    /// Returns whether a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> StorageResult<bool>;

    /// Returns whether `path` is an existing directory.
    fn is_dir(&self, path: &Path) -> StorageResult<bool>;

    /// Creates `path` and all missing parents.
    fn create_dir_all(&self, path: &Path) -> StorageResult<()>;

    /// Lists the direct children of the directory at `path`.
    ///
    /// Order is unspecified.
    fn list(&self, path: &Path) -> StorageResult<Vec<DirEntry>>;
}

/// Shares one backend between a database and the code observing it.
impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        (**self).write(path, data)
    }

    fn append(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        (**self).append(path, data)
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        (**self).remove(path)
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> StorageResult<bool> {
        (**self).is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        (**self).create_dir_all(path)
    }

    fn list(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        (**self).list(path)
    }
}
