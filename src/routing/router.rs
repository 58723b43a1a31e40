//! Service route lookup.
//!
//! # Responsibilities
//! - Extract the service key from `{prefix}/{service}/...`
//! - Compute the service-relative path forwarded upstream
//!   (only a leading `{prefix}/{service}` is removed)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Explicit NoMatch rather than silent default
//! - Whether the service exists is the dispatcher's concern, not the router's

use crate::routing::matcher::PathPrefixMatcher;

/// A path resolved to a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub service: String,
    /// Path relative to the service, empty or starting with `/`.
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct ServiceRouter {
    prefix: PathPrefixMatcher,
}

impl ServiceRouter {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: PathPrefixMatcher::new(prefix),
        }
    }

    pub fn prefix(&self) -> &str {
        self.prefix.prefix()
    }

    /// Look up the service a path addresses, and the path relative to it.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let rest = self.prefix.strip(path)?;
        let rest = rest.strip_prefix('/')?;
        let (service, remainder) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        if service.is_empty() {
            return None;
        }
        Some(RouteMatch {
            service: service.to_string(),
            path: remainder.to_string(),
        })
    }
}
