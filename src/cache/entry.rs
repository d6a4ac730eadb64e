//! Cache Entry Module
//!
//! Defines cache entries and the arena that owns them.

use std::collections::hash_map::RandomState;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::FreshnessTracker;

// == Entry Id ==
/// Stable entry identifier. Ids are allocated monotonically and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// == Cache Entry ==
/// A cached response together with its metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub id: EntryId,
    /// The cached response
    pub payload: V,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last hit or attach (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Length of the current freshness window
    pub ttl: Duration,
    /// End of the current freshness window (Unix milliseconds)
    pub expires_at: u64,
    /// Number of index keys pointing at this entry
    pub(crate) reference_count: usize,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an unreferenced entry whose freshness window starts at `now_ms`.
    pub fn new(id: EntryId, payload: V, ttl: Duration, now_ms: u64) -> Self {
        Self {
            id,
            payload,
            created_at: now_ms,
            last_accessed_at: now_ms,
            ttl,
            expires_at: FreshnessTracker::expiry_for(now_ms, ttl),
            reference_count: 0,
        }
    }

    pub fn reference_count(&self) -> usize {
        self.reference_count
    }
}

// == Entry Store ==
/// Arena of entries addressed by [`EntryId`].
///
/// The store exclusively owns payloads. An entry may only be removed once
/// no index key references it.
#[derive(Debug)]
pub struct EntryStore<V> {
    entries: BTreeMap<EntryId, CacheEntry<V>>,
    /// Payload hash -> ids holding a payload with that hash
    by_payload: HashMap<u64, Vec<EntryId>>,
    hasher: RandomState,
    next_id: u64,
}

impl<V> Default for EntryStore<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_payload: HashMap::new(),
            hasher: RandomState::new(),
            next_id: 1,
        }
    }
}

impl<V: Hash + Eq> EntryStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    // == Create ==
    /// Allocates a fresh entry with `reference_count == 0`.
    ///
    /// The caller must bind at least one key to it within the same operation.
    pub fn create(&mut self, payload: V, ttl: Duration, now_ms: u64) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;

        let hash = self.hasher.hash_one(&payload);
        self.by_payload.entry(hash).or_default().push(id);
        self.entries.insert(id, CacheEntry::new(id, payload, ttl, now_ms));
        id
    }

    pub fn get(&self, id: EntryId) -> Option<&CacheEntry<V>> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut CacheEntry<V>> {
        self.entries.get_mut(&id)
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.entries.contains_key(&id)
    }

    // == Touch ==
    /// Updates `last_accessed_at`. Returns false if the entry does not exist.
    pub fn touch(&mut self, id: EntryId, now_ms: u64) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.last_accessed_at = now_ms;
                true
            }
            None => false,
        }
    }

    // == Remove ==
    /// Deletes an entry that no key references any more.
    ///
    /// Refuses (and reports) removal of a still-referenced entry.
    pub fn remove(&mut self, id: EntryId) -> Option<CacheEntry<V>> {
        let refs = self.entries.get(&id)?.reference_count;
        if refs != 0 {
            warn!(entry_id = %id, refs, "Refusing to remove an entry that is still referenced");
            return None;
        }

        let entry = self.entries.remove(&id)?;
        let hash = self.hasher.hash_one(&entry.payload);
        if let Some(ids) = self.by_payload.get_mut(&hash) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_payload.remove(&hash);
            }
        }
        Some(entry)
    }

    // == Find By Payload ==
    /// Returns the entry holding exactly this payload, if any.
    pub fn find_by_payload(&self, payload: &V) -> Option<EntryId> {
        let hash = self.hasher.hash_one(payload);
        self.by_payload.get(&hash)?.iter().copied().find(|id| {
            self.entries
                .get(id)
                .map(|entry| entry.payload == *payload)
                .unwrap_or(false)
        })
    }

    pub(crate) fn add_reference(&mut self, id: EntryId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.reference_count += 1;
                true
            }
            None => false,
        }
    }

    /// Returns the remaining count, or `None` if the entry does not exist.
    pub(crate) fn release_reference(&mut self, id: EntryId) -> Option<usize> {
        let entry = self.entries.get_mut(&id)?;
        entry.reference_count = entry.reference_count.saturating_sub(1);
        Some(entry.reference_count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<V>> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.entries.keys().copied().collect()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_create_starts_unreferenced() {
        let mut store = EntryStore::new();
        let id = store.create("answer".to_string(), TTL, 1_000);

        let entry = store.get(id).unwrap();
        assert_eq!(entry.payload, "answer");
        assert_eq!(entry.reference_count(), 0);
        assert_eq!(entry.created_at, 1_000);
        assert_eq!(entry.expires_at, 61_000);
    }

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let mut store = EntryStore::new();
        let first = store.create("a".to_string(), TTL, 0);
        assert!(store.remove(first).is_some());

        let second = store.create("a".to_string(), TTL, 0);
        assert!(second > first);
    }

    #[test]
    fn test_touch_updates_last_access() {
        let mut store = EntryStore::new();
        let id = store.create("a".to_string(), TTL, 0);

        assert!(store.touch(id, 500));
        assert_eq!(store.get(id).unwrap().last_accessed_at, 500);
        assert!(!store.touch(EntryId(99), 500));
    }

    #[test]
    fn test_remove_refuses_referenced_entry() {
        let mut store = EntryStore::new();
        let id = store.create("a".to_string(), TTL, 0);
        store.add_reference(id);

        assert!(store.remove(id).is_none());
        assert!(store.contains(id));

        assert_eq!(store.release_reference(id), Some(0));
        assert!(store.remove(id).is_some());
        assert!(!store.contains(id));
    }

    #[test]
    fn test_find_by_payload() {
        let mut store = EntryStore::new();
        let a = store.create("alpha".to_string(), TTL, 0);
        let b = store.create("beta".to_string(), TTL, 0);

        assert_eq!(store.find_by_payload(&"alpha".to_string()), Some(a));
        assert_eq!(store.find_by_payload(&"beta".to_string()), Some(b));
        assert_eq!(store.find_by_payload(&"gamma".to_string()), None);

        store.remove(a);
        assert_eq!(store.find_by_payload(&"alpha".to_string()), None);
    }

    #[test]
    fn test_release_missing_entry() {
        let mut store: EntryStore<String> = EntryStore::new();
        assert_eq!(store.release_reference(EntryId(7)), None);
        assert!(!store.add_reference(EntryId(7)));
    }
}
