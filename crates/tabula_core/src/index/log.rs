//! Append-only log of index mutations.
//!
//! One entry per line:
//!
//! ```text
//! +<Model>:<Field>:<Value>=<ID>
//! -<Model>:<Field>:<Value>=<ID>
//! ```
//!
//! Backslashes and newlines inside the key are escaped as `\\` and `\n`,
//! so a field value can never split an entry. The ID follows the last `=`;
//! the key must contain a model and a field before its second `:`.
//!
//! The log is the only durable copy of the index. Replay applies every
//! line in order; a line that cannot be understood stops the replay, since
//! starting with a partial index would silently lose query results.

use super::{IndexEntry, IndexOp, SecondaryIndex};
use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};
use tabula_storage::StorageBackend;
use tracing::{debug, error};

/// The index log file of a base directory.
#[derive(Debug, Clone)]
pub struct IndexLog {
    path: PathBuf,
}

impl IndexLog {
    /// Creates a handle for the log at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `entries` in one write.
    ///
    /// The file is opened in append mode and closed again before returning.
    pub fn append(&self, backend: &dyn StorageBackend, entries: &[IndexEntry]) -> CoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&encode_line(entry));
            buf.push('\n');
        }
        backend.append(&self.path, buf.as_bytes())?;
        Ok(())
    }

    /// Rebuilds the index from the log. A missing log yields an empty index.
    ///
    /// # Errors
    ///
    /// Returns `IndexLogCorruption` for the first malformed line.
    pub fn replay(&self, backend: &dyn StorageBackend) -> CoreResult<SecondaryIndex> {
        let bytes = match backend.read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(SecondaryIndex::new()),
            Err(e) => return Err(e.into()),
        };

        let text = String::from_utf8_lossy(&bytes);
        let mut index = SecondaryIndex::new();
        let mut applied = 0usize;
        for (n, line) in text.lines().enumerate() {
            let Some(entry) = parse_line(line) else {
                error!(path = %self.path.display(), line_number = n + 1, line, "corrupt index log entry");
                return Err(CoreError::index_log_corruption(n + 1, line));
            };
            index.apply(&entry);
            applied += 1;
        }

        debug!(path = %self.path.display(), entries = applied, keys = index.len(), "replayed index log");
        Ok(index)
    }

    /// Rewrites the log as one `+` entry per live index entry.
    ///
    /// Replaying the compacted log yields the same index. Returns the
    /// number of entries written.
    pub fn compact(&self, backend: &dyn StorageBackend, index: &SecondaryIndex) -> CoreResult<usize> {
        let entries = index.entries();
        let mut buf = String::new();
        for (key, id) in &entries {
            buf.push_str(&encode_line(&IndexEntry::add(*key, *id)));
            buf.push('\n');
        }
        backend.write(&self.path, buf.as_bytes())?;
        Ok(entries.len())
    }
}

/// Renders an entry as a log line, without the newline.
pub fn encode_line(entry: &IndexEntry) -> String {
    format!("{}{}={}", entry.op.symbol(), escape(&entry.key), entry.id)
}

/// Parses one log line. Returns `None` if it is malformed.
pub fn parse_line(line: &str) -> Option<IndexEntry> {
    let mut chars = line.chars();
    let op = IndexOp::from_symbol(chars.next()?)?;
    let (key, id) = chars.as_str().rsplit_once('=')?;

    let id: i64 = id.parse().ok().filter(|id| *id > 0)?;
    let key = unescape(key)?;

    let mut parts = key.splitn(3, ':');
    let model = parts.next()?;
    let field = parts.next()?;
    parts.next()?;
    if model.is_empty() || field.is_empty() {
        return None;
    }

    Some(IndexEntry { op, key, id })
}

fn escape(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(key: &str) -> Option<String> {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '\\' => out.push('\\'),
                'n' => out.push('\n'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}
