//! LRU Tracker Module
//!
//! Implements the recency order used for cache eviction.

use std::collections::{BTreeSet, HashMap};

use crate::cache::EntryId;

// == LRU Tracker ==
/// Total order over live entry ids by last access.
///
/// Every insert or access stamps the entry with the next value of a logical
/// sequence, so the order never depends on clock resolution. Positions are
/// `(stamp, id)` pairs: if two stamps were ever equal, the lower id is older.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Oldest first
    order: BTreeSet<(u64, EntryId)>,
    stamps: HashMap<EntryId, u64>,
    sequence: u64,
}

impl LruTracker {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Insert ==
    /// Inserts an entry at the most-recent position.
    pub fn record_insert(&mut self, id: EntryId) {
        self.record_access(id);
    }

    // == Record Access ==
    /// Moves an entry to the most-recent position, inserting it if untracked.
    pub fn record_access(&mut self, id: EntryId) {
        self.sequence += 1;
        if let Some(previous) = self.stamps.insert(id, self.sequence) {
            self.order.remove(&(previous, id));
        }
        self.order.insert((self.sequence, id));
    }

    // == Remove ==
    /// Drops an entry from the order. Returns false if it was not tracked.
    pub fn remove(&mut self, id: EntryId) -> bool {
        match self.stamps.remove(&id) {
            Some(stamp) => {
                self.order.remove(&(stamp, id));
                true
            }
            None => false,
        }
    }

    // == Oldest ==
    /// Returns the least recently used entry without removing it.
    pub fn oldest(&self) -> Option<EntryId> {
        self.order.first().map(|(_, id)| *id)
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.stamps.contains_key(&id)
    }

    /// Tracked ids from least to most recently used.
    pub fn ordered(&self) -> Vec<EntryId> {
        self.order.iter().map(|(_, id)| *id).collect()
    }
}
