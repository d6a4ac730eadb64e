//! Background Tasks Module
//!
//! Periodic maintenance run alongside the server.
//!
//! # Tasks
//! - Expiry sweep: purges entries whose TTL has lapsed, even if never read again

mod sweep;

pub use sweep::spawn_sweep_task;
