//! Service descriptor and partial update types.

use std::time::Duration;

use crate::config::{CircuitBreakerConfig, ServiceConfig};

/// Static per-service configuration held by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Routing key (the `{service}` path segment).
    pub key: String,
    /// Human readable name.
    pub name: String,
    /// Upstream base URL.
    pub base_url: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Circuit breaker thresholds.
    pub breaker: CircuitBreakerConfig,
}

impl From<&ServiceConfig> for ServiceDescriptor {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            key: config.key.clone(),
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
            breaker: config.circuit_breaker,
        }
    }
}

/// Partial update merged into an existing descriptor.
///
/// `None` fields keep their current value. The key is never updated.
#[derive(Debug, Clone, Default)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub breaker: Option<CircuitBreakerConfig>,
}

impl ServiceDescriptor {
    /// Merge `update` into this descriptor.
    pub fn apply(&mut self, update: ServiceUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(base_url) = update.base_url {
            self.base_url = base_url;
        }
        if let Some(timeout) = update.timeout {
            self.timeout = timeout;
        }
        if let Some(max_retries) = update.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(breaker) = update.breaker {
            self.breaker = breaker;
        }
    }
}
