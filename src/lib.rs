//! HTTP API gateway.
//!
//! Routes `/{prefix}/{service}/...` requests to registered upstream services,
//! guarding each service with a circuit breaker and retrying transient
//! failures on a fixed backoff schedule.

// Core subsystems
pub mod config;
pub mod gateway;
pub mod http;
pub mod registry;
pub mod routing;
pub mod upstream;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Gateway, Shutdown};
