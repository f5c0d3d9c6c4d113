//! Where clauses and their evaluation against the secondary index.
//!
//! A clause matches records whose indexed `field` renders like `value`.
//! Clauses chained with [`Where::and`] must all match the same record.
//! Clauses passed side by side are alternatives: a record matching any of
//! them is a result.

use crate::error::{CoreError, CoreResult};
use crate::index::{index_key, SecondaryIndex};
use std::collections::{HashMap, HashSet};
use tabula_codec::Value;

/// An equality predicate on an indexed field.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    /// Name of the indexed field.
    pub field: String,
    /// Value to match; compared by its `Display` form.
    pub value: Value,
    /// Further clause that must hold for the same record.
    pub and: Option<Box<Where>>,
}

impl Where {
    /// Creates a single clause.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            and: None,
        }
    }

    /// Appends `other` to the end of this clause's `And` chain.
    #[must_use]
    pub fn and(mut self, other: Where) -> Self {
        let tail = match self.and.take() {
            Some(next) => (*next).and(other),
            None => other,
        };
        self.and = Some(Box::new(tail));
        self
    }

    /// Iterates the clause and everything chained to it.
    pub fn chain(&self) -> impl Iterator<Item = &Where> {
        std::iter::successors(Some(self), |w| w.and.as_deref())
    }
}

/// Resolves `clauses` to matching record IDs of `model`.
///
/// Each top-level clause yields the IDs present in the index under every
/// link of its chain; the results of all top-level clauses are merged in
/// first-seen order. With `first_only`, evaluation stops at the first hit.
///
/// # Errors
///
/// Returns `MissingClauses` for an empty clause list and `NoMatch` when
/// nothing qualifies.
pub fn evaluate(
    index: &SecondaryIndex,
    model: &str,
    clauses: &[Where],
    first_only: bool,
) -> CoreResult<Vec<i64>> {
    if clauses.is_empty() {
        return Err(CoreError::MissingClauses);
    }

    let mut matched = Vec::new();
    let mut seen = HashSet::new();
    for clause in clauses {
        for id in evaluate_chain(index, model, clause) {
            if seen.insert(id) {
                matched.push(id);
                if first_only {
                    return Ok(matched);
                }
            }
        }
    }

    if matched.is_empty() {
        return Err(CoreError::no_match(model));
    }
    Ok(matched)
}

/// Count-based intersection of one `And` chain.
///
/// Every link contributes each of its IDs once; an ID qualifies when its
/// count reaches the chain length. IDs come out in the order they qualify.
fn evaluate_chain(index: &SecondaryIndex, model: &str, clause: &Where) -> Vec<i64> {
    let links: Vec<&Where> = clause.chain().collect();
    let mut counts: HashMap<i64, usize> = HashMap::new();
    let mut qualified = Vec::new();

    for link in &links {
        let key = index_key(model, &link.field, &link.value);
        let mut in_bucket = HashSet::new();
        for &id in index.ids(&key) {
            if !in_bucket.insert(id) {
                continue;
            }
            let count = counts.entry(id).or_insert(0);
            *count += 1;
            if *count == links.len() {
                qualified.push(id);
            }
        }
    }
    qualified
}
