//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayConfig.services (startup)
//!     → descriptor.rs (ServiceDescriptor per service key)
//!     → store.rs (ServiceRegistry, concurrent map)
//!     → read by forwarder (timeouts, retries) and dispatcher (breaker thresholds)
//! ```
//!
//! # Design Decisions
//! - Services are never removed at runtime
//! - `update` merges partial changes and silently ignores unknown keys
//! - Outbound clients are bound at startup, so a `base_url` update only
//!   takes effect for clients built afterwards

pub mod descriptor;
pub mod store;

pub use descriptor::{ServiceDescriptor, ServiceUpdate};
pub use store::ServiceRegistry;
