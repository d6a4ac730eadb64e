//! API Module
//!
//! HTTP handlers and routing for serving the cache over REST.
//!
//! # Endpoints
//! - `POST /cache` - Store a response for a prompt
//! - `POST /lookup` - Fetch the cached response for a prompt
//! - `POST /invalidate` - Forget a prompt
//! - `GET|DELETE /entries/:id` - Inspect or remove an entry
//! - `GET /entries`, `GET /prompts` - Cache contents
//! - `GET /stats`, `GET /health`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
