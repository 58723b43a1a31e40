//! Health endpoints.
//!
//! # Data Flow
//! ```text
//! GET /health       → status.rs (registry + breaker states) → 200 JSON
//! GET /health/ready → 200 when services are registered, else 503
//! GET /health/live  → 200 while the process serves requests
//! ```
//!
//! # Design Decisions
//! - No active probing of upstreams; breaker state is the health signal
//! - Health routes are exempt from rate limiting

pub mod handlers;
pub mod status;

pub use handlers::{health, live, ready};
