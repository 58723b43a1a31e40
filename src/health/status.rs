//! Health response bodies.

use serde::{Deserialize, Serialize};

use crate::registry::ServiceDescriptor;
use crate::resilience::CircuitState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceHealth {
    pub key: String,
    pub name: String,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    /// `CLOSED` for services that have not been called yet.
    #[serde(rename = "circuitState")]
    pub circuit_state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    /// Seconds since startup.
    pub uptime: f64,
    pub services: Vec<ServiceHealth>,
}

/// Body shared by the readiness and liveness probes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeStatus {
    pub status: String,
    pub timestamp: String,
}

/// Overall status is `healthy` unless some breaker is open.
pub fn build_health(
    services: Vec<ServiceDescriptor>,
    breakers: &[(String, CircuitState)],
    uptime: f64,
    timestamp: String,
) -> HealthStatus {
    let services: Vec<ServiceHealth> = services
        .into_iter()
        .map(|service| {
            let state = breakers
                .iter()
                .find(|(key, _)| *key == service.key)
                .map(|(_, state)| *state)
                .unwrap_or(CircuitState::Closed);
            ServiceHealth {
                key: service.key,
                name: service.name,
                base_url: service.base_url,
                circuit_state: state.as_str().to_string(),
            }
        })
        .collect();

    let degraded = services
        .iter()
        .any(|s| s.circuit_state == CircuitState::Open.as_str());

    HealthStatus {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        timestamp,
        uptime,
        services,
    }
}
