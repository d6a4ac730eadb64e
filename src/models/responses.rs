//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheHit, CacheStats, EntryId};

/// Response body for a hit (POST /lookup)
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse {
    /// The prompt as submitted
    pub prompt: String,
    /// The cached model response
    pub response: String,
    pub entry_id: EntryId,
    /// Remaining freshness in seconds
    pub ttl_remaining: u64,
}

impl LookupResponse {
    pub fn new(prompt: impl Into<String>, hit: CacheHit<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: hit.payload,
            entry_id: hit.entry_id,
            ttl_remaining: hit.ttl_remaining.as_secs(),
        }
    }
}

/// Response body for POST /cache
#[derive(Debug, Clone, Serialize)]
pub struct PutResponse {
    pub entry_id: EntryId,
    /// Number of prompts now served by the entry
    pub reference_count: usize,
}

impl PutResponse {
    pub fn new(entry_id: EntryId, reference_count: usize) -> Self {
        Self {
            entry_id,
            reference_count,
        }
    }
}

/// Response body for POST /invalidate and DELETE /entries/:id
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Whether anything live was removed
    pub removed: bool,
}

impl InvalidateResponse {
    pub fn new(removed: bool) -> Self {
        Self { removed }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub capacity: usize,
}

impl StatsResponse {
    pub fn new(stats: CacheStats, capacity: usize) -> Self {
        let hit_rate = stats.hit_rate();
        Self {
            stats,
            hit_rate,
            capacity,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
