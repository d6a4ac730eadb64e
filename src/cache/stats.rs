//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and removals.

use serde::Serialize;

use crate::cache::EventKind;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful lookups
    pub hits: u64,
    /// Number of lookups that found nothing fresh
    pub misses: u64,
    /// Entries allocated by `put`
    pub entries_created: u64,
    /// Prompts attached to an existing entry
    pub attaches: u64,
    /// Entries removed by the LRU policy
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Entries removed on explicit request
    pub invalidations: u64,
    /// Entries dropped after their last prompt moved to a new payload
    pub superseded: u64,
    /// Current number of live entries
    pub total_entries: usize,
    /// Current number of prompt keys
    pub total_keys: usize,
}

impl CacheStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Counts a lifecycle event under its matching counter.
    pub fn record_event(&mut self, kind: EventKind) {
        match kind {
            EventKind::Created => self.entries_created += 1,
            EventKind::Attached => self.attaches += 1,
            EventKind::Evicted => self.evictions += 1,
            EventKind::Expired => self.expirations += 1,
            EventKind::Invalidated => self.invalidations += 1,
            EventKind::Superseded => self.superseded += 1,
            EventKind::Refreshed => {}
        }
    }

    pub fn set_sizes(&mut self, entries: usize, keys: usize) {
        self.total_entries = entries;
        self.total_keys = keys;
    }
}
