//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming path "/api/{service}/{rest...}"
//!     → matcher.rs (strip the prefix on a segment boundary)
//!     → router.rs (split off the service key)
//!     → Return: RouteMatch { service, path } or None
//! The dispatcher resolves every proxied request this way.
//! ```
//!
//! # Design Decisions
//! - Prefix fixed at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Only a leading `{prefix}/{service}` is stripped; later repeats are kept

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{RouteMatch, ServiceRouter};
