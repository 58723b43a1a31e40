//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket, health probes exempt)
//!     → Pass to routing
//! Forwarding:
//!     → headers.rs (drop hop-by-hop and gateway-internal headers)
//! Outgoing response:
//!     → headers.rs (security headers when enabled)
//! ```
//!
//! # Design Decisions
//! - Limits are per client IP; there is no authenticated identity to key on
//! - No trust in client input: clients cannot inject `x-gateway-*` headers upstream

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiter};
