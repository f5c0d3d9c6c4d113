//! On-disk layout and the base directory guard.
//!
//! ```text
//! <base>/.idxlog
//! <base>/<Model>/metadata/counter
//! <base>/<Model>/<7-digit ID>
//! ```
//!
//! Every table path handed out by [`PathResolver`] has been checked to lie
//! inside the base directory. A path that escapes it aborts the process:
//! it can only come from a corrupted model name or a hostile caller, and
//! no I/O is attempted.

use crate::error::{CoreError, CoreResult};
use std::path::{Component, Path, PathBuf};
use tracing::error;

/// File name of the index log inside the base directory.
pub const INDEX_LOG_FILE: &str = ".idxlog";

/// Name of the per-table metadata directory.
pub const METADATA_DIR: &str = "metadata";

/// Name of the counter file inside the metadata directory.
pub const COUNTER_FILE: &str = "counter";

/// Derives table, record and metadata paths from a base directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base: PathBuf,
}

impl PathResolver {
    /// Creates a resolver rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Returns the base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Returns the path of the index log.
    pub fn index_log(&self) -> PathBuf {
        self.base.join(INDEX_LOG_FILE)
    }

    /// Returns the guarded table for `model`.
    ///
    /// # Panics
    ///
    /// Panics if `model` is empty or contains `:` or a line break, since
    /// index keys could not be attributed to it, or if the resulting
    /// directory lies outside the base directory.
    pub fn table(&self, model: &str) -> Table {
        if model.is_empty() || model.contains([':', '\n', '\r']) {
            error!(model = %model.escape_debug(), "unusable model name");
            panic!("refusing I/O for model name {model:?}");
        }
        self.table_at(self.base.join(model))
    }

    /// Returns a guarded table for an explicit directory path.
    ///
    /// # Panics
    ///
    /// Panics if `dir` lies outside the base directory.
    pub fn table_at(&self, dir: impl Into<PathBuf>) -> Table {
        let dir = dir.into();
        self.guard(&dir);
        Table { dir }
    }

    /// Aborts unless `dir` is strictly below the base directory without any `..`.
    ///
    /// # Panics
    ///
    /// Panics on violation.
    pub fn guard(&self, dir: &Path) {
        let Ok(rest) = dir.strip_prefix(&self.base) else {
            error!(path = %dir.display(), base = %self.base.display(), "path escapes base directory");
            panic!(
                "refusing I/O outside of {}: {}",
                self.base.display(),
                dir.display()
            );
        };
        if rest.components().any(|c| !matches!(c, Component::Normal(_))) {
            error!(path = %dir.display(), "path contains a traversal segment");
            panic!("refusing I/O on path containing '..': {}", dir.display());
        }
        if rest.as_os_str().is_empty() {
            error!(path = %dir.display(), "path is the base directory itself");
            panic!("refusing I/O on the base directory as a table: {}", dir.display());
        }
    }
}

/// The directory of one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    dir: PathBuf,
}

impl Table {
    /// Returns the table directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the metadata directory.
    pub fn metadata(&self) -> PathBuf {
        self.dir.join(METADATA_DIR)
    }

    /// Returns the counter file.
    pub fn counter(&self) -> PathBuf {
        self.metadata().join(COUNTER_FILE)
    }

    /// Returns the record file for `id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId` if `id` is smaller than 1.
    pub fn record(&self, id: i64) -> CoreResult<PathBuf> {
        if id < 1 {
            return Err(CoreError::InvalidId { id });
        }
        Ok(self.dir.join(record_file_name(id)))
    }
}

/// Formats an ID as a record file name.
pub fn record_file_name(id: i64) -> String {
    format!("{id:07}")
}

/// Parses a record file name; anything that is not a positive decimal is `None`.
pub fn parse_record_file_name(name: &str) -> Option<i64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok().filter(|id| *id > 0)
}
