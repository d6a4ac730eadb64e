//! Cache Store Module
//!
//! Composes the entry arena, the index and the recency order into one
//! state object. Every removal, whatever triggers it, goes through
//! [`CacheStore::purge`], which unbinds all aliases of an entry before the
//! entry itself is dropped.

use std::hash::Hash;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error};

use crate::cache::{
    duration_ms, CacheEvent, CacheStats, CanonicalKey, EntryId, EntryStore, EventKind,
    FreshnessTracker, Index, LruTracker,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Lookup Result ==
/// A fresh hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit<V> {
    pub entry_id: EntryId,
    pub payload: V,
    pub ttl_remaining: Duration,
}

// == Put Outcome ==
/// Entry a put landed on, read under the same lock as the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PutOutcome {
    pub entry_id: EntryId,
    /// Prompts bound to the entry once the put completed
    pub reference_count: usize,
}

// == Entry Info ==
/// Point-in-time view of one entry and its aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo<V> {
    pub id: EntryId,
    pub payload: V,
    pub reference_count: usize,
    pub created_at: u64,
    pub last_accessed_at: u64,
    pub expires_at: u64,
    pub ttl_ms: u64,
    /// Canonical keys bound to the entry, ascending
    pub keys: Vec<String>,
}

// == Snapshot ==
/// Deterministic view of the whole cache state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot<V> {
    /// Ascending by id
    pub entries: Vec<EntryInfo<V>>,
    /// Canonical key -> entry id, ascending by key
    pub index: Vec<(String, EntryId)>,
    /// Least to most recently used
    pub recency: Vec<EntryId>,
}

// == Cache Store ==
/// Single-owner cache state. Not synchronized; see `PromptCache`.
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: EntryStore<V>,
    index: Index,
    lru: LruTracker,
    stats: CacheStats,
    pending_events: Vec<CacheEvent>,
    capacity: usize,
    deduplicate_payloads: bool,
}

impl<V: Clone + Hash + Eq> CacheStore<V> {
    // == Constructor ==
    /// Creates an empty store. Fails if the capacity is zero.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: EntryStore::new(),
            index: Index::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            pending_events: Vec::new(),
            capacity: config.capacity,
            deduplicate_payloads: config.deduplicate_payloads,
        })
    }

    // == Lookup ==
    /// Resolves a key to a fresh entry.
    ///
    /// A stale entry is purged together with all of its aliases and the
    /// lookup reports a miss. A hit refreshes the entry's recency.
    pub fn lookup(&mut self, key: &CanonicalKey, now: u64) -> Option<CacheHit<V>> {
        let Some(id) = self.resolve_live(key, now) else {
            self.stats.record_miss();
            return None;
        };

        self.entries.touch(id, now);
        self.lru.record_access(id);
        let entry = self.entries.get(id)?;
        let hit = CacheHit {
            entry_id: id,
            payload: entry.payload.clone(),
            ttl_remaining: Duration::from_millis(FreshnessTracker::ttl_remaining_ms(entry, now)),
        };

        self.stats.record_hit();
        Some(hit)
    }

    /// Freshness-aware presence check that leaves recency untouched.
    pub fn contains(&mut self, key: &CanonicalKey, now: u64) -> bool {
        self.resolve_live(key, now).is_some()
    }

    // == Put ==
    /// Stores `payload` under `key` and returns the entry now bound to it.
    ///
    /// - Same payload as the key's live entry: the freshness window is reset.
    /// - Different payload: the key moves to an entry holding the new payload;
    ///   the old entry is dropped once no key references it.
    /// - New key: attached to a live entry with an identical payload when
    ///   de-duplication is on, otherwise a new entry is created.
    ///
    /// Capacity is enforced afterwards. A TTL under one millisecond would
    /// produce an entry that is stale on arrival and is rejected before any
    /// state changes.
    pub fn put(
        &mut self,
        key: CanonicalKey,
        payload: V,
        ttl: Duration,
        now: u64,
    ) -> Result<PutOutcome> {
        if duration_ms(ttl) == 0 {
            return Err(CacheError::InvalidTtl(format!(
                "{:?} is shorter than one millisecond",
                ttl
            )));
        }

        let target = match self.resolve_live(&key, now) {
            Some(current) if self.payload_matches(current, &payload) => {
                self.refresh_entry(current, ttl, now);
                current
            }
            Some(current) => {
                let target = self.acquire_entry(payload, ttl, now);
                self.index.bind(key, target, &mut self.entries)?;
                self.release_if_unreferenced(current, now);
                target
            }
            None => {
                let target = self.acquire_entry(payload, ttl, now);
                if let Some(previous) = self.index.bind(key, target, &mut self.entries)? {
                    self.release_if_unreferenced(previous, now);
                }
                target
            }
        };

        self.evict_if_over_capacity(now);
        let reference_count = self
            .entries
            .get(target)
            .map(|entry| entry.reference_count())
            .unwrap_or(0);
        Ok(PutOutcome {
            entry_id: target,
            reference_count,
        })
    }

    // == Refresh ==
    /// Resets the freshness window of the live entry bound to `key`.
    pub fn refresh(&mut self, key: &CanonicalKey, ttl: Duration, now: u64) -> bool {
        match self.resolve_live(key, now) {
            Some(id) => {
                self.refresh_entry(id, ttl, now);
                true
            }
            None => false,
        }
    }

    // == Invalidate ==
    /// Unbinds one key. The entry goes away only with its last key.
    ///
    /// Returns false when the key was absent or already stale.
    pub fn invalidate(&mut self, key: &CanonicalKey, now: u64) -> bool {
        let Some(id) = self.resolve_live(key, now) else {
            return false;
        };

        let remaining = self.index.unbind(key, &mut self.entries);
        debug_assert_eq!(remaining, Some(id));
        if self.entries.get(id).map(|e| e.reference_count()) == Some(0) {
            self.purge(id, EventKind::Invalidated, now);
        }
        true
    }

    /// Removes an entry together with every key bound to it.
    pub fn invalidate_entry(&mut self, id: EntryId, now: u64) -> bool {
        self.purge(id, EventKind::Invalidated, now)
    }

    // == Evict If Over Capacity ==
    /// Evicts least recently used entries until the store fits its capacity.
    pub fn evict_if_over_capacity(&mut self, now: u64) -> Vec<EntryId> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let Some(victim) = self.lru.oldest() else {
                self.report_violation(format!(
                    "{} entries over capacity but recency order is empty",
                    self.entries.len()
                ));
                break;
            };
            if !self.purge(victim, EventKind::Evicted, now) {
                // Recency held an id the arena does not know
                self.lru.remove(victim);
                self.report_violation(format!("recency order held unknown entry {}", victim));
                continue;
            }
            evicted.push(victim);
        }
        evicted
    }

    // == Purge Expired ==
    /// Removes every stale entry. Returns the number removed.
    pub fn purge_expired(&mut self, now: u64) -> usize {
        let stale: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|entry| !FreshnessTracker::is_fresh(entry, now))
            .map(|entry| entry.id)
            .collect();

        let mut removed = 0;
        for id in stale {
            if self.purge(id, EventKind::Expired, now) {
                removed += 1;
            }
        }
        removed
    }

    /// Removes every entry. Returns the number removed.
    pub fn clear(&mut self, now: u64) -> usize {
        let mut removed = 0;
        for id in self.entries.ids() {
            if self.purge(id, EventKind::Invalidated, now) {
                removed += 1;
            }
        }
        removed
    }

    // == Inspection ==
    /// Describes a live entry; a stale one is purged and reported absent.
    pub fn entry_info(&mut self, id: EntryId, now: u64) -> Option<EntryInfo<V>> {
        let fresh = FreshnessTracker::is_fresh(self.entries.get(id)?, now);
        if !fresh {
            self.purge(id, EventKind::Expired, now);
            return None;
        }
        self.describe(id)
    }

    pub fn keys_for(&self, id: EntryId) -> Vec<CanonicalKey> {
        self.index.keys_for(id)
    }

    pub fn snapshot(&self) -> CacheSnapshot<V> {
        CacheSnapshot {
            entries: self
                .entries
                .iter()
                .filter_map(|entry| self.describe(entry.id))
                .collect(),
            index: self
                .index
                .sorted()
                .into_iter()
                .map(|(key, id)| (key.to_string(), id))
                .collect(),
            recency: self.lru.ordered(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_sizes(self.entries.len(), self.index.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drains the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<CacheEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // == Verify Integrity ==
    /// Cross-checks the index, the arena and the recency order.
    ///
    /// Staleness is not checked: expiry is lazy, so a stale entry may stay
    /// in place until its next access.
    pub fn verify_integrity(&self) -> Result<()> {
        for (key, id) in self.index.sorted() {
            if !self.entries.contains(id) {
                return Err(CacheError::InvariantViolation(format!(
                    "key '{}' points at missing entry {}",
                    key, id
                )));
            }
        }

        let mut referenced = 0;
        for entry in self.entries.iter() {
            let keys = self.index.keys_for(entry.id);
            if entry.reference_count() == 0 {
                return Err(CacheError::InvariantViolation(format!(
                    "entry {} is live with no references",
                    entry.id
                )));
            }
            if entry.reference_count() != keys.len() {
                return Err(CacheError::InvariantViolation(format!(
                    "entry {} counts {} references but {} keys point at it",
                    entry.id,
                    entry.reference_count(),
                    keys.len()
                )));
            }
            if let Some(key) = keys.iter().find(|k| self.index.lookup(k) != Some(entry.id)) {
                return Err(CacheError::InvariantViolation(format!(
                    "reverse mapping of entry {} lists '{}' which resolves elsewhere",
                    entry.id, key
                )));
            }
            if !self.lru.contains(entry.id) {
                return Err(CacheError::InvariantViolation(format!(
                    "entry {} missing from recency order",
                    entry.id
                )));
            }
            referenced += keys.len();
        }

        if referenced != self.index.len() {
            return Err(CacheError::InvariantViolation(format!(
                "index holds {} keys but entries account for {}",
                self.index.len(),
                referenced
            )));
        }
        if self.lru.len() != self.entries.len() {
            return Err(CacheError::InvariantViolation(format!(
                "recency order tracks {} ids for {} entries",
                self.lru.len(),
                self.entries.len()
            )));
        }
        if self.entries.len() > self.capacity {
            return Err(CacheError::InvariantViolation(format!(
                "{} entries exceed capacity {}",
                self.entries.len(),
                self.capacity
            )));
        }
        Ok(())
    }

    // == Purge ==
    /// Referential cleanup: unbinds every key of `id`, then drops the entry
    /// from the arena and the recency order. Returns false if `id` is unknown.
    fn purge(&mut self, id: EntryId, kind: EventKind, now: u64) -> bool {
        if !self.entries.contains(id) {
            return false;
        }

        let keys = self.index.keys_for(id);
        for key in &keys {
            let unbound = self.index.unbind(key, &mut self.entries);
            if unbound != Some(id) {
                self.report_violation(format!(
                    "key '{}' listed for entry {} resolved to {:?}",
                    key, id, unbound
                ));
            }
        }

        if !self.lru.remove(id) {
            self.report_violation(format!("entry {} was not in the recency order", id));
        }
        if self.entries.remove(id).is_none() {
            self.report_violation(format!("entry {} still referenced after cleanup", id));
            return false;
        }

        debug!(entry_id = %id, aliases = keys.len(), reason = ?kind, "Removed cache entry");
        self.emit(kind, id, now);
        true
    }

    /// Returns the id bound to `key` if that entry is fresh, lazily
    /// purging it (and all its aliases) when stale.
    fn resolve_live(&mut self, key: &CanonicalKey, now: u64) -> Option<EntryId> {
        let id = self.index.lookup(key)?;
        let Some(entry) = self.entries.get(id) else {
            self.report_violation(format!("key '{}' points at missing entry {}", key, id));
            self.index.unbind(key, &mut self.entries);
            return None;
        };

        if FreshnessTracker::is_fresh(entry, now) {
            Some(id)
        } else {
            self.purge(id, EventKind::Expired, now);
            None
        }
    }

    /// Finds a live entry holding `payload` or creates one, leaving it at the
    /// most recent position with a freshly started window.
    fn acquire_entry(&mut self, payload: V, ttl: Duration, now: u64) -> EntryId {
        if self.deduplicate_payloads {
            if let Some(existing) = self.entries.find_by_payload(&payload) {
                let fresh = self
                    .entries
                    .get(existing)
                    .map(|entry| FreshnessTracker::is_fresh(entry, now))
                    .unwrap_or(false);
                if fresh {
                    self.refresh_entry(existing, ttl, now);
                    self.emit(EventKind::Attached, existing, now);
                    return existing;
                }
                self.purge(existing, EventKind::Expired, now);
            }
        }

        let id = self.entries.create(payload, ttl, now);
        self.lru.record_insert(id);
        self.emit(EventKind::Created, id, now);
        id
    }

    fn refresh_entry(&mut self, id: EntryId, ttl: Duration, now: u64) {
        if let Some(entry) = self.entries.get_mut(id) {
            FreshnessTracker::refresh(entry, ttl, now);
            entry.last_accessed_at = now;
            self.lru.record_access(id);
            self.emit(EventKind::Refreshed, id, now);
        }
    }

    fn release_if_unreferenced(&mut self, id: EntryId, now: u64) {
        if self.entries.get(id).map(|e| e.reference_count()) == Some(0) {
            self.purge(id, EventKind::Superseded, now);
        }
    }

    fn payload_matches(&self, id: EntryId, payload: &V) -> bool {
        self.entries
            .get(id)
            .map(|entry| entry.payload == *payload)
            .unwrap_or(false)
    }

    fn describe(&self, id: EntryId) -> Option<EntryInfo<V>> {
        let entry = self.entries.get(id)?;
        Some(EntryInfo {
            id,
            payload: entry.payload.clone(),
            reference_count: entry.reference_count(),
            created_at: entry.created_at,
            last_accessed_at: entry.last_accessed_at,
            expires_at: entry.expires_at,
            ttl_ms: duration_ms(entry.ttl),
            keys: self
                .index
                .keys_for(id)
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
    }

    fn emit(&mut self, kind: EventKind, id: EntryId, now: u64) {
        self.stats.record_event(kind);
        self.pending_events.push(CacheEvent::new(kind, id, now));
    }

    fn report_violation(&self, message: String) {
        error!(%message, "Cache invariant violated");
        debug_assert!(false, "cache invariant violated: {}", message);
    }
}
