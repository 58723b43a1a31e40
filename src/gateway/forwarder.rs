//! Service broker: forwards one request to its upstream with retries.
//!
//! # Responsibilities
//! - Resolve the service descriptor and its pre-built client
//! - Bound each attempt by the service timeout
//! - Retry transient failures on the fixed backoff schedule
//! - Report the total elapsed time on success

use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Instant;

use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::request::{GatewayRequest, GatewayResponse, ResponseMetadata};
use crate::registry::ServiceRegistry;
use crate::resilience::timeouts::with_timeout;
use crate::resilience::{BackoffSchedule, RetryPolicy};
use crate::upstream::{HttpUpstream, OutboundRequest, UpstreamClient, UpstreamError};

pub struct ServiceBroker {
    registry: Arc<ServiceRegistry>,
    clients: HashMap<String, Arc<dyn UpstreamClient>>,
    schedule: BackoffSchedule,
}

impl ServiceBroker {
    /// Build one HTTP client per registered service.
    pub fn new(registry: Arc<ServiceRegistry>, schedule: BackoffSchedule) -> Result<Self, UpstreamError> {
        let mut clients: HashMap<String, Arc<dyn UpstreamClient>> = HashMap::new();
        for service in registry.all() {
            let client = HttpUpstream::new(&service.base_url, service.timeout)?;
            tracing::debug!(service = %service.key, base_url = %service.base_url, "Upstream client ready");
            clients.insert(service.key, Arc::new(client));
        }
        Ok(Self::with_clients(registry, clients, schedule))
    }

    /// Use caller-provided clients, keyed by service.
    pub fn with_clients(
        registry: Arc<ServiceRegistry>,
        clients: HashMap<String, Arc<dyn UpstreamClient>>,
        schedule: BackoffSchedule,
    ) -> Self {
        Self {
            registry,
            clients,
            schedule,
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Forward `request` to its service.
    ///
    /// Fails without any network attempt for unknown services. Otherwise the
    /// last upstream failure is returned once retries are exhausted or a
    /// non-retryable failure is seen.
    pub async fn forward(&self, request: &GatewayRequest) -> GatewayResult<GatewayResponse> {
        let start = Instant::now();

        let service = self
            .registry
            .get(&request.service)
            .ok_or_else(|| GatewayError::ServiceNotFound(request.service.clone()))?;
        let client = self
            .clients
            .get(&service.key)
            .cloned()
            .ok_or_else(|| GatewayError::ClientUnavailable(service.key.clone()))?;

        let outbound = OutboundRequest::from(request);
        let policy = RetryPolicy::new(service.max_retries, self.schedule.clone());

        tracing::info!(
            service = %service.key,
            method = %request.method,
            path = %request.path,
            "Forwarding request"
        );

        let key = service.key.as_str();
        let timeout = service.timeout;
        let outbound = &outbound;
        let result = policy
            .run(key, |attempt| {
                let client = Arc::clone(&client);
                async move {
                    tracing::debug!(service = %key, attempt = attempt + 1, "Upstream attempt");
                    with_timeout(timeout, client.send(outbound)).await
                }
            })
            .await;

        let response_time_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(upstream) => {
                tracing::info!(
                    service = %service.key,
                    status = upstream.status.as_u16(),
                    response_time_ms,
                    "Upstream responded"
                );
                Ok(GatewayResponse {
                    status: upstream.status,
                    data: upstream.body,
                    headers: upstream.headers,
                    metadata: ResponseMetadata {
                        service: service.key.clone(),
                        response_time_ms,
                        cached: false,
                    },
                })
            }
            Err(error) => {
                tracing::error!(
                    service = %service.key,
                    error = %error,
                    response_time_ms,
                    "Service request failed"
                );
                Err(GatewayError::Upstream(error))
            }
        }
    }
}

impl std::fmt::Debug for ServiceBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut services: Vec<&String> = self.clients.keys().collect();
        services.sort();
        f.debug_struct("ServiceBroker")
            .field("services", &services)
            .field("schedule", &self.schedule)
            .finish()
    }
}
