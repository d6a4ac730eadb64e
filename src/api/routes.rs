//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    entries_handler, entry_handler, health_handler, invalidate_entry_handler, invalidate_handler,
    lookup_handler, prompts_handler, put_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /cache` - Store a response for a prompt
/// - `POST /lookup` - Fetch the cached response for a prompt
/// - `POST /invalidate` - Forget a prompt
/// - `GET /entries` - Snapshot of entries and recency order
/// - `GET /entries/:id` - One entry with its prompts
/// - `DELETE /entries/:id` - Remove an entry and all its prompts
/// - `GET /prompts` - Canonical prompt to entry mapping
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/cache", post(put_handler))
        .route("/lookup", post(lookup_handler))
        .route("/invalidate", post(invalidate_handler))
        .route("/entries", get(entries_handler))
        .route(
            "/entries/:id",
            get(entry_handler).delete(invalidate_entry_handler),
        )
        .route("/prompts", get(prompts_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
