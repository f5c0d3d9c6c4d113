//! File-based storage backend for persistent storage.

use crate::backend::{DirEntry, StorageBackend};
use crate::error::{StorageError, StorageResult};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffix of the scratch file used for atomic replacement.
const TEMP_SUFFIX: &str = ".tmp";

/// A file-based storage backend.
///
/// # Durability
///
/// `write` goes through a sibling `<name>.tmp` file which is synced and
/// then renamed over the target, so a crash leaves either the old or the
/// new content. With `sync_on_write` the parent directory is synced too.
///
/// # Example
///
/// ```no_run
/// use tabula_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::new();
/// backend.create_dir_all(Path::new("/tmp/tabula/User")).unwrap();
/// backend.write(Path::new("/tmp/tabula/User/0000001"), b"record").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileBackend {
    sync_on_write: bool,
}

impl FileBackend {
    /// Creates a file backend that syncs every write.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sync_on_write: true,
        }
    }

    /// Sets whether writes are synced to disk before returning.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(TEMP_SUFFIX);
        path.with_file_name(name)
    }

    #[cfg(unix)]
    fn sync_parent(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent(_path: &Path) -> StorageResult<()> {
        // NTFS journals directory metadata; there is no directory fsync.
        Ok(())
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps `io::ErrorKind::NotFound` onto the backend's `NotFound` variant.
fn map_missing(err: io::Error, path: &Path) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::not_found(path)
    } else {
        StorageError::Io(err)
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        if path.is_dir() {
            return Err(StorageError::WrongKind {
                path: path.to_path_buf(),
                expected: "file",
            });
        }
        fs::read(path).map_err(|e| map_missing(e, path))
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let temp = Self::temp_path(path);
        let mut file = File::create(&temp).map_err(|e| map_missing(e, &temp))?;
        let replaced = (|| {
            file.write_all(data)?;
            if self.sync_on_write {
                file.sync_all()?;
            }
            drop(file);
            fs::rename(&temp, path)
        })();
        if let Err(e) = replaced {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        if self.sync_on_write {
            Self::sync_parent(path)?;
        }
        Ok(())
    }

    fn append(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| map_missing(e, path))?;
        file.write_all(data)?;
        if self.sync_on_write {
            file.sync_data()?;
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        fs::remove_file(path).map_err(|e| map_missing(e, path))
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        Ok(path.try_exists()?)
    }

    fn is_dir(&self, path: &Path) -> StorageResult<bool> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn list(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| map_missing(e, path))? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        Ok(entries)
    }
}
