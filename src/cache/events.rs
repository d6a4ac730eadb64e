//! Cache Events Module
//!
//! Lifecycle events emitted to an optional observer.

use serde::Serialize;
use tracing::info;

use crate::cache::EntryId;

// == Event Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new entry was allocated
    Created,
    /// A new prompt was bound to an existing entry
    Attached,
    /// An entry's freshness window was reset
    Refreshed,
    /// Removed under capacity pressure
    Evicted,
    /// Found stale on access or by a sweep
    Expired,
    /// Removed on explicit request
    Invalidated,
    /// Lost its last prompt to a newer payload
    Superseded,
}

// == Cache Event ==
/// `{kind, entry_id, timestamp}`, timestamp in Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheEvent {
    pub kind: EventKind,
    pub entry_id: EntryId,
    pub timestamp: u64,
}

impl CacheEvent {
    pub fn new(kind: EventKind, entry_id: EntryId, timestamp: u64) -> Self {
        Self {
            kind,
            entry_id,
            timestamp,
        }
    }
}

// == Event Sink ==
/// Observer for cache lifecycle events.
///
/// Events are delivered after the cache lock is released, so a sink may
/// call back into the cache.
///
/// Ordering holds only within one cache call: its events arrive in the order
/// they happened. Batches from concurrent calls on different threads may
/// reach the sink in either order; sort by `timestamp` (then by arrival) if a
/// global order matters.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &CacheEvent);
}

impl<F> EventSink for F
where
    F: Fn(&CacheEvent) + Send + Sync,
{
    fn emit(&self, event: &CacheEvent) {
        self(event)
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CacheEvent) {
        info!(
            kind = ?event.kind,
            entry_id = event.entry_id.0,
            timestamp = event.timestamp,
            "cache event"
        );
    }
}
