//! Evicta - an embeddable cache for AI model responses
//!
//! Serves repeated prompts from memory with TTL freshness, LRU eviction and
//! referential cleanup of every prompt alias pointing at an entry.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEvent, CacheHit, EntryId, EventKind, EventSink, PromptCache, PutOutcome};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
