//! Reconciliation of fetched external data against stored rows
//!
//! Pure planning step shared by every sync: given what is stored and what an
//! external API returned, decide which rows to insert, update and remove for
//! a [`MergeStrategy`]. Applying the plan is the caller's job.

use hallyu_common::MergeStrategy;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// Item that can be matched by a natural key and enriched field by field
pub trait Reconcilable: Clone {
    type Key: Eq + Hash + Clone + Debug;

    /// Natural key identifying the item across sources (external id, platform, ...)
    fn key(&self) -> Self::Key;

    /// Copy every field that is empty on `self` but set on `other`.
    /// Returns true if anything changed. Set fields are never overwritten.
    fn fill_missing_from(&mut self, other: &Self) -> bool;
}

/// Changes needed to reconcile stored items with fetched ones
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan<T> {
    pub insert: Vec<T>,
    /// Existing items with newly filled fields
    pub update: Vec<T>,
    pub remove: Vec<T>,
    pub unchanged: usize,
}

impl<T> ReconcilePlan<T> {
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }
}

impl<T> Default for ReconcilePlan<T> {
    fn default() -> Self {
        Self {
            insert: Vec::new(),
            update: Vec::new(),
            remove: Vec::new(),
            unchanged: 0,
        }
    }
}

/// Drop fetched items whose key was already seen (first occurrence wins)
pub fn dedup_by_key<T: Reconcilable>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.key()))
        .collect()
}

/// Plan the changes turning `existing` into the reconciled set
///
/// - `ReplaceAll`: remove every existing item, insert every fetched item
/// - `Incremental`: insert fetched items with unknown keys only
/// - `Merge`: insert unknown keys, fill empty fields of known keys
pub fn reconcile<T: Reconcilable>(
    existing: &[T],
    fetched: Vec<T>,
    strategy: MergeStrategy,
) -> ReconcilePlan<T> {
    let fetched = dedup_by_key(fetched);
    let mut plan = ReconcilePlan::default();

    if strategy == MergeStrategy::ReplaceAll {
        plan.remove = existing.to_vec();
        plan.insert = fetched;
        return plan;
    }

    let by_key: HashMap<T::Key, &T> = existing.iter().map(|item| (item.key(), item)).collect();
    let mut touched = HashSet::new();

    for item in fetched {
        match by_key.get(&item.key()) {
            None => plan.insert.push(item),
            Some(current) => {
                if strategy == MergeStrategy::Merge {
                    let mut merged = (*current).clone();
                    if merged.fill_missing_from(&item) {
                        touched.insert(item.key());
                        plan.update.push(merged);
                    }
                }
            }
        }
    }

    plan.unchanged = existing.len() - touched.len();
    plan
}
