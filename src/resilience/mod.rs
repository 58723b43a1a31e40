//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → circuit_breaker.rs (reject fast while the service's circuit is open)
//!     → retries.rs (attempt loop, retry classification)
//!         → timeouts.rs (per-attempt deadline)
//!         → backoff.rs (fixed delay before the next attempt)
//!     → circuit_breaker.rs (record the final outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream attempt has a deadline
//! - Retries are invisible to the breaker: one forwarded request is one outcome
//! - Circuit breaker prevents cascading failures, one instance per service
//! - There is no deadline spanning the whole retry sequence; the worst case is
//!   the sum of the backoff delays plus one timeout per attempt

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::BackoffSchedule;
pub use circuit_breaker::{CircuitBreaker, CircuitOpenError, CircuitState};
pub use retries::{is_retryable, RetryPolicy};
