//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine and its HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Prompt or entry not present (an expected outcome, not a failure)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Capacity must allow at least one live entry
    #[error("Capacity misconfigured: {0} (must be greater than zero)")]
    CapacityMisconfigured(i64),

    /// A configuration value could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// TTL too short to produce a fresh entry
    #[error("Invalid TTL: {0}")]
    InvalidTtl(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal bookkeeping disagrees across structures
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::InvalidTtl(_) => StatusCode::BAD_REQUEST,
            CacheError::CapacityMisconfigured(_)
            | CacheError::InvalidConfig(_)
            | CacheError::InvariantViolation(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (CacheError::NotFound("p".into()), StatusCode::NOT_FOUND),
            (CacheError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (CacheError::InvalidTtl("0ms".into()), StatusCode::BAD_REQUEST),
            (
                CacheError::InvariantViolation("dangling".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (CacheError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_capacity_message() {
        let err = CacheError::CapacityMisconfigured(0);
        assert!(err.to_string().contains("greater than zero"));
    }
}
