//! Request gateway subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request + service key
//!     → dispatcher.rs (404/405/413 checks, breaker gate, response mapping)
//!     → CircuitBreaker::execute
//!     → forwarder.rs (ServiceBroker: descriptor, client, retry loop)
//!     → upstream client
//! ```
//!
//! # Design Decisions
//! - Retries happen inside one breaker call; the breaker sees one outcome per request
//! - Every forward failure counts against the breaker, client errors included
//! - Breakers are created lazily, once per registered service

pub mod dispatcher;
pub mod error;
pub mod forwarder;
pub mod request;

pub use dispatcher::RequestDispatcher;
pub use error::{GatewayError, GatewayResult};
pub use forwarder::ServiceBroker;
pub use request::{GatewayMethod, GatewayRequest, GatewayResponse, ResponseMetadata};
