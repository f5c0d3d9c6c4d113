//! Secondary index over fields that resources mark as indexed.
//!
//! An index key is `<Model>:<Field>:<Value>` where the value is rendered
//! with [`Value`]'s `Display`, so a lookup with `"23"` finds records
//! indexed with `23u32`. The forward map answers lookups, the reverse map
//! lists the keys of one record so it can be unindexed without scanning.
//!
//! The in-memory index is never snapshotted. It is rebuilt at startup by
//! replaying the [`IndexLog`].

mod log;

pub use log::IndexLog;

use std::collections::HashMap;
use std::fmt;
use tabula_codec::Value;

/// Builds the index key of one field value.
pub fn index_key(model: &str, field: &str, value: &Value) -> String {
    format!("{model}:{field}:{value}")
}

/// Index mutation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOp {
    /// `+`: the record carries this key.
    Add,
    /// `-`: the record no longer carries this key.
    Remove,
}

impl IndexOp {
    /// Returns the log symbol of this operation.
    pub const fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Remove => '-',
        }
    }

    /// Parses a log symbol.
    pub const fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Remove),
            _ => None,
        }
    }
}

/// One index mutation, the unit of the index log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Add or remove.
    pub op: IndexOp,
    /// `<Model>:<Field>:<Value>`.
    pub key: String,
    /// Record ID.
    pub id: i64,
}

impl IndexEntry {
    /// Creates an add entry.
    pub fn add(key: impl Into<String>, id: i64) -> Self {
        Self {
            op: IndexOp::Add,
            key: key.into(),
            id,
        }
    }

    /// Creates a remove entry.
    pub fn remove(key: impl Into<String>, id: i64) -> Self {
        Self {
            op: IndexOp::Remove,
            key: key.into(),
            id,
        }
    }

    /// Returns the model part of the key.
    pub fn model(&self) -> &str {
        model_of(&self.key)
    }
}

/// Unescaped rendering, e.g. `+User:Name:Ann=1`.
impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}={}", self.op.symbol(), self.key, self.id)
    }
}

fn model_of(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}

/// In-memory forward and reverse index.
///
/// Buckets are unordered: removal swaps the last ID into the freed slot.
/// A bucket may hold the same ID twice if the log added it twice; it then
/// takes two removals to drop it, matching what replay would do.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SecondaryIndex {
    forward: HashMap<String, Vec<i64>>,
    reverse: HashMap<(String, i64), Vec<String>>,
}

impl SecondaryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one mutation.
    pub fn apply(&mut self, entry: &IndexEntry) {
        match entry.op {
            IndexOp::Add => self.add(&entry.key, entry.id),
            IndexOp::Remove => self.remove(&entry.key, entry.id),
        }
    }

    /// Records that `id` carries `key`.
    pub fn add(&mut self, key: &str, id: i64) {
        self.forward.entry(key.to_string()).or_default().push(id);
        self.reverse
            .entry((model_of(key).to_string(), id))
            .or_default()
            .push(key.to_string());
    }

    /// Records that `id` no longer carries `key`. Unknown pairs are ignored.
    pub fn remove(&mut self, key: &str, id: i64) {
        if let Some(ids) = self.forward.get_mut(key) {
            if let Some(pos) = ids.iter().position(|x| *x == id) {
                ids.swap_remove(pos);
            }
            if ids.is_empty() {
                self.forward.remove(key);
            }
        }

        let record = (model_of(key).to_string(), id);
        if let Some(keys) = self.reverse.get_mut(&record) {
            if let Some(pos) = keys.iter().position(|k| k == key) {
                keys.swap_remove(pos);
            }
            if keys.is_empty() {
                self.reverse.remove(&record);
            }
        }
    }

    /// Returns the IDs indexed under `key`, in bucket order.
    pub fn ids(&self, key: &str) -> &[i64] {
        self.forward.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the keys a record is indexed under.
    pub fn keys_for(&self, model: &str, id: i64) -> &[String] {
        self.reverse
            .get(&(model.to_string(), id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Returns every `(key, id)` pair, sorted.
    pub fn entries(&self) -> Vec<(&str, i64)> {
        let mut entries: Vec<(&str, i64)> = self
            .forward
            .iter()
            .flat_map(|(key, ids)| ids.iter().map(move |id| (key.as_str(), *id)))
            .collect();
        entries.sort_unstable();
        entries
    }

    /// Compares two indexes ignoring bucket order.
    pub fn same_content(&self, other: &Self) -> bool {
        self.entries() == other.entries() && self.reverse_entries() == other.reverse_entries()
    }

    fn reverse_entries(&self) -> Vec<(&str, i64, &str)> {
        let mut entries: Vec<(&str, i64, &str)> = self
            .reverse
            .iter()
            .flat_map(|((model, id), keys)| {
                keys.iter().map(move |k| (model.as_str(), *id, k.as_str()))
            })
            .collect();
        entries.sort_unstable();
        entries
    }
}
