//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Initialize gateway subsystems in dependency order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Nothing here is global; the built `Gateway` is handed to the HTTP server

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{validation::validate_config, ConfigError, GatewayConfig};
use crate::gateway::{RequestDispatcher, ServiceBroker};
use crate::registry::ServiceRegistry;
use crate::resilience::BackoffSchedule;
use crate::security::RateLimiter;
use crate::upstream::{UpstreamClient, UpstreamError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build upstream client: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The wired-up request path: registry, broker and dispatcher.
#[derive(Debug)]
pub struct Gateway {
    pub config: GatewayConfig,
    pub registry: Arc<ServiceRegistry>,
    pub broker: Arc<ServiceBroker>,
    pub dispatcher: Arc<RequestDispatcher>,
    /// Present when rate limiting is enabled.
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl Gateway {
    /// Build from configuration, with one HTTP client per service.
    pub fn build(config: GatewayConfig) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let registry = Arc::new(ServiceRegistry::from_config(&config.services));
        let broker = ServiceBroker::new(Arc::clone(&registry), BackoffSchedule::from(&config.retries))?;
        Ok(Self::assemble(config, registry, broker))
    }

    /// Build with caller-provided upstream clients.
    pub fn with_clients(
        config: GatewayConfig,
        clients: HashMap<String, Arc<dyn UpstreamClient>>,
    ) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let registry = Arc::new(ServiceRegistry::from_config(&config.services));
        let broker = ServiceBroker::with_clients(
            Arc::clone(&registry),
            clients,
            BackoffSchedule::from(&config.retries),
        );
        Ok(Self::assemble(config, registry, broker))
    }

    fn assemble(config: GatewayConfig, registry: Arc<ServiceRegistry>, broker: ServiceBroker) -> Self {
        let broker = Arc::new(broker);
        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&broker),
            &config.routing.prefix,
            config.security.max_body_size,
        ));
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&config.rate_limit)));

        for service in registry.all() {
            tracing::info!(
                service = %service.key,
                name = %service.name,
                base_url = %service.base_url,
                timeout_ms = service.timeout.as_millis() as u64,
                max_retries = service.max_retries,
                "Upstream service configured"
            );
        }

        Self {
            config,
            registry,
            broker,
            dispatcher,
            rate_limiter,
        }
    }
}
