//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Inbound routing settings.
    pub routing: RoutingConfig,

    /// Upstream service definitions, one per routable service key.
    pub services: Vec<ServiceConfig>,

    /// Backoff schedule shared by all services.
    pub retries: RetryConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security hardening settings.
    pub security: SecurityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            routing: RoutingConfig::default(),
            services: default_services(),
            retries: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Inbound routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Path prefix under which services are mounted (`{prefix}/{service}/...`).
    pub prefix: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            prefix: "/api".to_string(),
        }
    }
}

/// A single upstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Routing key, the `{service}` path segment (e.g. "ai").
    pub key: String,

    /// Human readable name.
    pub name: String,

    /// Upstream base URL (e.g., "http://localhost:8000").
    pub base_url: String,

    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the initial attempt.
    #[serde(default)]
    pub max_retries: u32,

    /// Circuit breaker thresholds.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// Circuit breaker thresholds for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time the circuit stays open before a trial call, in milliseconds.
    pub reset_timeout_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
        }
    }
}

/// Backoff schedule between retry attempts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the 1st, 2nd, 3rd... retry in milliseconds.
    pub delays_ms: Vec<u64>,

    /// Delay for any retry past the end of `delays_ms`.
    pub fallback_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delays_ms: vec![1_000, 2_000, 4_000],
            fallback_delay_ms: 5_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Refill window in milliseconds.
    pub window_ms: u64,

    /// Requests allowed per client within one window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 100,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty output for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

fn default_services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig {
            key: "ai".to_string(),
            name: "AI Service".to_string(),
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
            max_retries: 2,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 5,
                reset_timeout_ms: 60_000,
            },
        },
        ServiceConfig {
            key: "data".to_string(),
            name: "Data Service".to_string(),
            base_url: "http://localhost:8001".to_string(),
            timeout_ms: 10_000,
            max_retries: 3,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 5,
                reset_timeout_ms: 30_000,
            },
        },
        ServiceConfig {
            key: "rag".to_string(),
            name: "RAG Service".to_string(),
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 20_000,
            max_retries: 2,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 5,
                reset_timeout_ms: 60_000,
            },
        },
    ]
}
