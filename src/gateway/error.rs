//! Gateway error taxonomy.

use thiserror::Error;

use crate::resilience::CircuitOpenError;
use crate::upstream::UpstreamError;

/// Final failure of a dispatched request, after retries.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Service key is not in the registry.
    #[error("Service '{0}' not found in registry")]
    ServiceNotFound(String),

    /// Registered service without an outbound client.
    #[error("HTTP client for service '{0}' not initialized")]
    ClientUnavailable(String),

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Refused by the service's circuit breaker; no upstream was contacted.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// Last upstream failure once retries were exhausted or skipped.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
