//! Freshness Tracker Module
//!
//! Time source abstraction and lazy TTL evaluation for cache entries.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::cache::CacheEntry;

// == Clock ==
/// Source of "now" in Unix milliseconds.
pub trait Clock: Send + Sync + Debug {
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        current_timestamp_ms()
    }
}

/// Manually driven clock for tests and deterministic replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_ms(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// == Freshness Tracker ==
/// Answers "is this entry still fresh?" at access time.
///
/// An entry is fresh while `now < expires_at`, where `expires_at` is the
/// start of its current freshness window plus its TTL. Once the TTL has
/// fully elapsed the entry is stale, with no grace period.
#[derive(Debug, Clone)]
pub struct FreshnessTracker {
    clock: Arc<dyn Clock>,
}

impl FreshnessTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Computes the expiry timestamp for a window starting at `start_ms`.
    pub fn expiry_for(start_ms: u64, ttl: Duration) -> u64 {
        start_ms.saturating_add(duration_ms(ttl))
    }

    pub fn is_fresh<V>(entry: &CacheEntry<V>, now_ms: u64) -> bool {
        now_ms < entry.expires_at
    }

    /// Resets the freshness window without changing the entry's identity.
    pub fn refresh<V>(entry: &mut CacheEntry<V>, new_ttl: Duration, now_ms: u64) {
        entry.ttl = new_ttl;
        entry.expires_at = Self::expiry_for(now_ms, new_ttl);
    }

    /// Remaining freshness in milliseconds, zero once stale.
    pub fn ttl_remaining_ms<V>(entry: &CacheEntry<V>, now_ms: u64) -> u64 {
        entry.expires_at.saturating_sub(now_ms)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as zero.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Duration in whole milliseconds, saturating at `u64::MAX`.
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
