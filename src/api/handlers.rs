//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{CacheSnapshot, EntryId, EntryInfo, PromptCache, TracingSink};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::models::{
    HealthResponse, InvalidateResponse, LookupResponse, PromptRequest, PutRequest, PutResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// The cache synchronizes internally, so handlers share it through a plain `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<PromptCache<String>>,
}

impl AppState {
    pub fn new(cache: PromptCache<String>) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Builds the cache from configuration, logging lifecycle events.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let cache = PromptCache::new(config.clone())?.with_sink(TracingSink);
        Ok(Self::new(cache))
    }
}

/// Handler for POST /cache
///
/// Stores a model response for a prompt.
pub async fn put_handler(
    State(state): State<AppState>,
    Json(req): Json<PutRequest>,
) -> Result<Json<PutResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req
        .ttl
        .map(Duration::from_secs)
        .unwrap_or_else(|| state.cache.default_ttl());
    let outcome = state.cache.put_with_outcome(&req.prompt, req.response, ttl)?;

    Ok(Json(PutResponse::new(outcome.entry_id, outcome.reference_count)))
}

/// Handler for POST /lookup
///
/// Returns the cached response for a prompt, 404 on a miss.
pub async fn lookup_handler(
    State(state): State<AppState>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<LookupResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    match state.cache.lookup(&req.prompt) {
        Some(hit) => Ok(Json(LookupResponse::new(req.prompt, hit))),
        None => Err(CacheError::NotFound(req.prompt)),
    }
}

/// Handler for POST /invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    Ok(Json(InvalidateResponse::new(
        state.cache.invalidate(&req.prompt),
    )))
}

/// Handler for GET /entries/:id
pub async fn entry_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<EntryInfo<String>>> {
    state
        .cache
        .entry_info(EntryId(id))
        .map(Json)
        .ok_or_else(|| CacheError::NotFound(format!("entry {}", EntryId(id))))
}

/// Handler for DELETE /entries/:id
pub async fn invalidate_entry_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Json<InvalidateResponse> {
    Json(InvalidateResponse::new(
        state.cache.invalidate_entry(EntryId(id)),
    ))
}

/// Handler for GET /entries
///
/// Entries with their aliases plus the recency order.
pub async fn entries_handler(State(state): State<AppState>) -> Json<CacheSnapshot<String>> {
    Json(state.cache.snapshot())
}

/// Handler for GET /prompts
///
/// Canonical prompt -> entry id mapping.
pub async fn prompts_handler(State(state): State<AppState>) -> Json<BTreeMap<String, EntryId>> {
    Json(state.cache.snapshot().index.into_iter().collect())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.cache.stats(),
        state.cache.capacity(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState::new(PromptCache::new(CacheConfig::with_capacity(100)).unwrap())
    }

    fn put_request(prompt: &str, response: &str) -> PutRequest {
        PutRequest {
            prompt: prompt.to_string(),
            response: response.to_string(),
            ttl: None,
        }
    }

    fn prompt_request(prompt: &str) -> PromptRequest {
        PromptRequest {
            prompt: prompt.to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_and_lookup_handler() {
        let state = test_state();

        let put = put_handler(State(state.clone()), Json(put_request("What is Rust?", "A language")))
            .await
            .unwrap();
        assert_eq!(put.reference_count, 1);

        let hit = lookup_handler(State(state), Json(prompt_request("what is  RUST?")))
            .await
            .unwrap();
        assert_eq!(hit.response, "A language");
        assert_eq!(hit.entry_id, put.entry_id);
    }

    #[tokio::test]
    async fn test_shared_response_reports_reference_count() {
        let state = test_state();

        put_handler(State(state.clone()), Json(put_request("Define LRU", "Least recently used")))
            .await
            .unwrap();
        let second = put_handler(
            State(state),
            Json(put_request("What does LRU mean?", "Least recently used")),
        )
        .await
        .unwrap();

        assert_eq!(second.reference_count, 2);
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let result = lookup_handler(State(test_state()), Json(prompt_request("nothing"))).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let state = test_state();
        put_handler(State(state.clone()), Json(put_request("p", "r")))
            .await
            .unwrap();

        let first = invalidate_handler(State(state.clone()), Json(prompt_request("p")))
            .await
            .unwrap();
        let second = invalidate_handler(State(state), Json(prompt_request("p")))
            .await
            .unwrap();

        assert!(first.removed);
        assert!(!second.removed);
    }

    #[tokio::test]
    async fn test_invalidate_entry_handler() {
        let state = test_state();
        let put = put_handler(State(state.clone()), Json(put_request("p", "r")))
            .await
            .unwrap();

        let response = invalidate_entry_handler(State(state.clone()), Path(put.entry_id.0)).await;
        assert!(response.removed);
        assert!(entry_handler(State(state), Path(put.entry_id.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(test_state())).await;
        assert_eq!(response.stats.hits, 0);
        assert_eq!(response.capacity, 100);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_put_zero_ttl_rejected() {
        let state = test_state();
        let req = PutRequest {
            ttl: Some(0),
            ..put_request("p", "r")
        };

        let result = put_handler(State(state.clone()), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_put_invalid_request() {
        let result = put_handler(State(test_state()), Json(put_request("", "r"))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
