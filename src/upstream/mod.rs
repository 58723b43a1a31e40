//! Outbound client subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayRequest
//!     → types.rs (OutboundRequest: filtered headers, body only for POST/PUT/PATCH)
//!     → client.rs (UpstreamClient::send, one HTTP attempt to base_url + path)
//!     → UpstreamResponse | UpstreamError::{Response, Timeout, Transport, InvalidRequest}
//! ```
//!
//! # Design Decisions
//! - One client per service, built at startup and reused (pooled connections)
//! - Error statuses become a tagged failure carrying status, headers and body
//! - The transport sits behind a trait so the forwarder can be driven by
//!   scripted clients in tests

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{HttpUpstream, UpstreamClient};
pub use types::{OutboundRequest, UpstreamError, UpstreamResponse};
