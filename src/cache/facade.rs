//! Prompt Cache Facade
//!
//! Thread-safe public surface over [`CacheStore`]. A single mutex guards
//! the index, the arena and the recency order together, so every
//! multi-structure step is atomic with respect to all callers.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{
    CacheHit, CacheSnapshot, CacheStats, CacheStore, CanonicalKey, Clock, EntryId, EntryInfo,
    EventSink, FreshnessTracker, Normalizer, PutOutcome, SystemClock,
};
use crate::config::CacheConfig;
use crate::error::Result;

// == Prompt Cache ==
/// Embeddable response cache keyed by normalized prompts.
pub struct PromptCache<V = String> {
    state: Mutex<CacheStore<V>>,
    normalizer: Normalizer,
    freshness: FreshnessTracker,
    default_ttl: Duration,
    sink: Option<Arc<dyn EventSink>>,
}

impl<V: Clone + Hash + Eq> PromptCache<V> {
    // == Constructors ==
    /// Creates a cache on the system clock.
    ///
    /// Fails with `CapacityMisconfigured` if the capacity is zero.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = CacheStore::new(&config)?;
        Ok(Self {
            state: Mutex::new(store),
            normalizer: Normalizer::new(config.normalization),
            freshness: FreshnessTracker::new(clock),
            default_ttl: config.default_ttl,
            sink: None,
        })
    }

    /// Installs an observer for lifecycle events.
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    // == Get ==
    /// Returns the cached payload for `prompt`, or `None` on a miss.
    pub fn get(&self, prompt: &str) -> Option<V> {
        self.lookup(prompt).map(|hit| hit.payload)
    }

    /// Like [`get`](Self::get) but reports the entry id and remaining TTL.
    pub fn lookup(&self, prompt: &str) -> Option<CacheHit<V>> {
        let key = self.normalizer.normalize(prompt);
        self.lookup_key(&key)
    }

    /// Looks up a prompt given as raw bytes; invalid UTF-8 never fails.
    pub fn get_bytes(&self, prompt: &[u8]) -> Option<V> {
        let key = self.normalizer.normalize_bytes(prompt);
        self.lookup_key(&key).map(|hit| hit.payload)
    }

    pub fn lookup_key(&self, key: &CanonicalKey) -> Option<CacheHit<V>> {
        self.with_store(|store, now| store.lookup(key, now))
    }

    /// Freshness-aware presence check that does not count as a use.
    pub fn contains(&self, prompt: &str) -> bool {
        let key = self.normalizer.normalize(prompt);
        self.with_store(|store, now| store.contains(&key, now))
    }

    // == Put ==
    /// Caches `payload` for `prompt`, fresh for `ttl`.
    ///
    /// Concurrent puts for the same prompt are serialized; the last writer's
    /// payload wins. Fails with `InvalidTtl` when `ttl` is under one millisecond.
    pub fn put(&self, prompt: &str, payload: V, ttl: Duration) -> Result<EntryId> {
        let key = self.normalizer.normalize(prompt);
        self.put_key(key, payload, ttl)
    }

    /// [`put`](Self::put) with the configured default TTL.
    pub fn put_default(&self, prompt: &str, payload: V) -> Result<EntryId> {
        self.put(prompt, payload, self.default_ttl)
    }

    pub fn put_bytes(&self, prompt: &[u8], payload: V, ttl: Duration) -> Result<EntryId> {
        let key = self.normalizer.normalize_bytes(prompt);
        self.put_key(key, payload, ttl)
    }

    pub fn put_key(&self, key: CanonicalKey, payload: V, ttl: Duration) -> Result<EntryId> {
        self.with_store(|store, now| store.put(key, payload, ttl, now))
            .map(|outcome| outcome.entry_id)
    }

    /// Like [`put`](Self::put), also reporting how many prompts share the
    /// entry at the moment the write completed.
    pub fn put_with_outcome(&self, prompt: &str, payload: V, ttl: Duration) -> Result<PutOutcome> {
        let key = self.normalizer.normalize(prompt);
        self.with_store(|store, now| store.put(key, payload, ttl, now))
    }

    /// Resets the freshness window of the entry serving `prompt`.
    pub fn refresh(&self, prompt: &str, ttl: Duration) -> bool {
        let key = self.normalizer.normalize(prompt);
        self.with_store(|store, now| store.refresh(&key, ttl, now))
    }

    // == Invalidate ==
    /// Forgets `prompt`. Other prompts sharing its entry keep resolving.
    pub fn invalidate(&self, prompt: &str) -> bool {
        let key = self.normalizer.normalize(prompt);
        self.with_store(|store, now| store.invalidate(&key, now))
    }

    /// Removes an entry and every prompt bound to it.
    pub fn invalidate_entry(&self, id: EntryId) -> bool {
        self.with_store(|store, now| store.invalidate_entry(id, now))
    }

    /// Removes every stale entry; normally expiry happens lazily on access.
    pub fn purge_expired(&self) -> usize {
        self.with_store(|store, now| store.purge_expired(now))
    }

    pub fn clear(&self) -> usize {
        self.with_store(|store, now| store.clear(now))
    }

    // == Inspection ==
    pub fn entry_info(&self, id: EntryId) -> Option<EntryInfo<V>> {
        self.with_store(|store, now| store.entry_info(id, now))
    }

    pub fn keys_for(&self, id: EntryId) -> Vec<CanonicalKey> {
        self.state.lock().keys_for(id)
    }

    pub fn snapshot(&self) -> CacheSnapshot<V> {
        self.state.lock().snapshot()
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats()
    }

    pub fn verify_integrity(&self) -> Result<()> {
        self.state.lock().verify_integrity()
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    pub fn key_count(&self) -> usize {
        self.state.lock().key_count()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn normalize(&self, prompt: &str) -> CanonicalKey {
        self.normalizer.normalize(prompt)
    }

    /// Runs `op` under the lock, then delivers the events it produced.
    ///
    /// Delivery is unordered with respect to other threads' calls.
    fn with_store<R>(&self, op: impl FnOnce(&mut CacheStore<V>, u64) -> R) -> R {
        let (result, events) = {
            let mut store = self.state.lock();
            let now = self.freshness.now();
            let result = op(&mut store, now);
            (result, store.take_events())
        };

        if let Some(sink) = &self.sink {
            for event in &events {
                sink.emit(event);
            }
        }
        result
    }
}

impl<V> fmt::Debug for PromptCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptCache")
            .field("normalizer", &self.normalizer)
            .field("default_ttl", &self.default_ttl)
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEvent, EventKind, ManualClock, NormalizationMode};
    use crate::error::CacheError;
    use std::sync::{OnceLock, Weak};

    const TTL: Duration = Duration::from_secs(60);

    fn manual_cache(capacity: usize) -> (PromptCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache =
            PromptCache::with_clock(CacheConfig::with_capacity(capacity), clock.clone()).unwrap();
        (cache, clock)
    }

    #[test]
    fn test_new_rejects_zero_capacity() {
        let result = PromptCache::<String>::new(CacheConfig::with_capacity(0));
        assert!(matches!(result, Err(CacheError::CapacityMisconfigured(0))));
    }

    #[test]
    fn test_round_trip() {
        let (cache, _) = manual_cache(10);
        cache.put("What is Rust?", "A language".to_string(), TTL).unwrap();
        assert_eq!(cache.get("What is Rust?"), Some("A language".to_string()));
    }

    #[test]
    fn test_zero_ttl_put_leaves_cache_untouched() {
        let (cache, _) = manual_cache(1);
        cache.put("kept", "r".to_string(), TTL).unwrap();

        let result = cache.put("dead", "d".to_string(), Duration::ZERO);
        assert!(matches!(result, Err(CacheError::InvalidTtl(_))));
        assert_eq!(cache.get("kept"), Some("r".to_string()));
        assert!(!cache.contains("dead"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_with_outcome_counts_shared_prompts() {
        let (cache, _) = manual_cache(10);
        let first = cache.put_with_outcome("Define LRU", "R".to_string(), TTL).unwrap();
        let second = cache
            .put_with_outcome("What does LRU mean?", "R".to_string(), TTL)
            .unwrap();

        assert_eq!(first.reference_count, 1);
        assert_eq!(second.entry_id, first.entry_id);
        assert_eq!(second.reference_count, 2);
    }

    #[test]
    fn test_normalized_prompts_share_a_key() {
        let (cache, _) = manual_cache(10);
        cache.put("Hello World", "R".to_string(), TTL).unwrap();

        assert_eq!(cache.get("  hello \u{200B}  WORLD "), Some("R".to_string()));
        assert_eq!(cache.key_count(), 1);
    }

    #[test]
    fn test_ttl_expiry_with_manual_clock() {
        let (cache, clock) = manual_cache(10);
        let id = cache.put("p", "r".to_string(), Duration::from_millis(1)).unwrap();

        clock.advance(Duration::from_millis(2));

        assert_eq!(cache.get("p"), None);
        assert!(!cache.invalidate_entry(id));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_order() {
        let (cache, _) = manual_cache(2);
        cache.put("a", "ra".to_string(), TTL).unwrap();
        cache.put("b", "rb".to_string(), TTL).unwrap();
        cache.get("a");
        cache.put("c", "rc".to_string(), TTL).unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_multi_prompt_mapping_without_normalization() {
        let config = CacheConfig {
            normalization: NormalizationMode::empty(),
            ..CacheConfig::with_capacity(10)
        };
        let cache: PromptCache = PromptCache::new(config).unwrap();

        let first = cache.put("Hello World", "R".to_string(), TTL).unwrap();
        let second = cache.put("hello   world", "R".to_string(), TTL).unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entry_info(first).unwrap().reference_count, 2);

        assert!(cache.invalidate("Hello World"));
        assert_eq!(cache.get("hello   world"), Some("R".to_string()));
        assert_eq!(cache.get("Hello World"), None);
        cache.verify_integrity().unwrap();
    }

    #[test]
    fn test_put_default_uses_configured_ttl() {
        let (cache, clock) = manual_cache(10);
        cache.put_default("p", "r".to_string()).unwrap();

        clock.advance(Duration::from_secs(86_399));
        assert!(cache.contains("p"));
        clock.advance(Duration::from_secs(1));
        assert!(!cache.contains("p"));
    }

    #[test]
    fn test_refresh() {
        let (cache, clock) = manual_cache(10);
        cache.put("p", "r".to_string(), TTL).unwrap();

        clock.advance(Duration::from_secs(50));
        assert!(cache.refresh("p", TTL));
        clock.advance(Duration::from_secs(50));
        assert_eq!(cache.get("p"), Some("r".to_string()));
    }

    #[test]
    fn test_malformed_bytes_are_cacheable() {
        let (cache, _) = manual_cache(10);
        let bad = [0xc3, 0x28];

        cache.put_bytes(&bad, "r".to_string(), TTL).unwrap();
        assert_eq!(cache.get_bytes(&bad), Some("r".to_string()));
        assert_eq!(cache.get_bytes(&[0xc3, 0x29]), None);
    }

    #[test]
    fn test_sink_receives_events_after_unlock() {
        let (cache, _) = manual_cache(1);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::<CacheEvent>::new()));
        let sink_seen = seen.clone();
        let cache = cache.with_sink(move |event: &CacheEvent| sink_seen.lock().push(*event));

        let a = cache.put("a", "ra".to_string(), TTL).unwrap();
        cache.put("b", "rb".to_string(), TTL).unwrap();

        let seen = seen.lock();
        assert!(seen
            .iter()
            .any(|e| e.kind == EventKind::Evicted && e.entry_id == a && e.timestamp == 1_000));
    }

    #[test]
    fn test_sink_may_reenter_cache() {
        let slot: Arc<OnceLock<Weak<PromptCache>>> = Arc::new(OnceLock::new());
        let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let sink_slot = slot.clone();
        let sink_observed = observed.clone();
        let cache = PromptCache::new(CacheConfig::with_capacity(4))
            .unwrap()
            .with_sink(move |_: &CacheEvent| {
                if let Some(cache) = sink_slot.get().and_then(Weak::upgrade) {
                    // Would deadlock if events were delivered under the lock
                    sink_observed.lock().push(cache.len());
                }
            });
        let cache = Arc::new(cache);
        slot.set(Arc::downgrade(&cache)).unwrap();

        cache.put("a", "r".to_string(), TTL).unwrap();

        assert_eq!(*observed.lock(), vec![1]);
    }
}
