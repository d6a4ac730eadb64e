//! Cache Module
//!
//! Prompt-keyed response cache with lazy TTL expiry, LRU eviction and
//! many-prompts-to-one-entry indirection.

mod entry;
mod events;
mod facade;
mod freshness;
mod index;
mod lru;
mod normalize;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, EntryId, EntryStore};
pub use events::{CacheEvent, EventKind, EventSink, TracingSink};
pub use facade::PromptCache;
pub use freshness::{current_timestamp_ms, duration_ms, Clock, FreshnessTracker, ManualClock, SystemClock};
pub use index::Index;
pub use lru::LruTracker;
pub use normalize::{CanonicalKey, NormalizationMode, Normalizer};
pub use stats::CacheStats;
pub use store::{CacheHit, CacheSnapshot, CacheStore, EntryInfo, PutOutcome};
