//! Inbound request dispatch.
//!
//! # Responsibilities
//! - Resolve `{prefix}/{service}/...` to a service and relative path
//! - Turn an inbound HTTP request into a `GatewayRequest`
//! - Gate forwarding through the service's circuit breaker
//! - Map every outcome to an HTTP response (never fails)
//!
//! # Outcome Mapping
//! ```text
//! no service in path         → 404 JSON error
//! unknown service            → 404 JSON error, no breaker created
//! unsupported method         → 405 JSON error
//! body over limit            → 413 JSON error
//! body stream broken         → 400 JSON error
//! circuit open               → 503 JSON error, upstream not contacted
//! upstream error response    → upstream status + body, verbatim
//! anything else              → 500 JSON error
//! success                    → upstream status + body + x-gateway-* headers
//! ```

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode},
    response::Response,
};
use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::time::Instant;

use crate::gateway::error::GatewayError;
use crate::gateway::forwarder::ServiceBroker;
use crate::gateway::request::{GatewayMethod, GatewayRequest};
use crate::http::request::RequestIdExt;
use crate::http::response::{json_error, passthrough, with_gateway_headers};
use crate::observability::metrics;
use crate::registry::{ServiceDescriptor, ServiceRegistry};
use crate::resilience::{CircuitBreaker, CircuitState};
use crate::routing::{RouteMatch, ServiceRouter};
use crate::upstream::UpstreamError;

/// Metrics label for requests naming an unregistered service.
const UNKNOWN_SERVICE_LABEL: &str = "unknown";

pub struct RequestDispatcher {
    registry: Arc<ServiceRegistry>,
    broker: Arc<ServiceBroker>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    router: ServiceRouter,
    max_body_size: usize,
}

impl RequestDispatcher {
    pub fn new(broker: Arc<ServiceBroker>, route_prefix: &str, max_body_size: usize) -> Self {
        Self {
            registry: Arc::clone(broker.registry()),
            broker,
            breakers: DashMap::new(),
            router: ServiceRouter::new(route_prefix),
            max_body_size,
        }
    }

    pub fn router(&self) -> &ServiceRouter {
        &self.router
    }

    /// The breaker for `service`, if one has been created.
    pub fn breaker(&self, service: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(service).map(|b| Arc::clone(b.value()))
    }

    /// State of every breaker created so far, sorted by service.
    pub fn breaker_states(&self) -> Vec<(String, CircuitState)> {
        let mut states: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    fn breaker_for(&self, service: &ServiceDescriptor) -> Arc<CircuitBreaker> {
        let entry = self
            .breakers
            .entry(service.key.clone())
            .or_insert_with(|| {
                tracing::debug!(service = %service.key, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(service.key.clone(), service.breaker))
            });
        Arc::clone(entry.value())
    }

    /// Dispatch `request` to the service its path names and build the client response.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let request_id = request.request_id().to_string();
        let method = request.method().clone();

        let Some(route) = self.router.resolve(request.uri().path()) else {
            metrics::record_request(UNKNOWN_SERVICE_LABEL, method.as_str(), 404, start.elapsed());
            return json_error(
                StatusCode::NOT_FOUND,
                "Not found",
                format!("Route {} {} not found", method, request.uri().path()),
            );
        };
        let service = route.service.as_str();

        let Some(descriptor) = self.registry.get(service) else {
            tracing::warn!(request_id = %request_id, service = %service, "Unknown service");
            metrics::record_request(UNKNOWN_SERVICE_LABEL, method.as_str(), 404, start.elapsed());
            return json_error(
                StatusCode::NOT_FOUND,
                "Service not found",
                format!("Service '{}' not found", service),
            );
        };

        let breaker = self.breaker_for(&descriptor);

        let gateway_request = match self.build_request(request, &route).await {
            Ok(r) => r,
            Err(response) => {
                tracing::warn!(
                    request_id = %request_id,
                    service = %service,
                    method = %method,
                    status = response.status().as_u16(),
                    "Request rejected"
                );
                metrics::record_request(service, method.as_str(), response.status().as_u16(), start.elapsed());
                return response;
            }
        };

        let result = breaker
            .execute(|| self.broker.forward(&gateway_request))
            .await;

        let response = match result {
            Ok(forwarded) => {
                let response = passthrough(forwarded.status, &forwarded.headers, forwarded.data);
                with_gateway_headers(
                    response,
                    &forwarded.metadata.service,
                    forwarded.metadata.response_time_ms,
                )
            }
            Err(error) => self.error_response(&request_id, &error, breaker.state()),
        };

        let status = response.status().as_u16();
        tracing::info!(
            request_id = %request_id,
            service = %service,
            method = %method,
            path = %gateway_request.path,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request dispatched"
        );
        metrics::record_request(service, method.as_str(), status, start.elapsed());
        response
    }

    async fn build_request(&self, request: Request<Body>, route: &RouteMatch) -> Result<GatewayRequest, Response> {
        let method = GatewayMethod::try_from(request.method()).map_err(|e| {
            json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", e.to_string())
        })?;

        let (parts, body) = request.into_parts();
        let query = parts.uri.query().map(str::to_string);
        let body = self.read_body(body).await?;

        Ok(GatewayRequest {
            service: route.service.clone(),
            path: route.path.clone(),
            method,
            headers: parts.headers,
            body,
            query,
        })
    }

    /// Buffer the body, refusing it once it passes `max_body_size`.
    async fn read_body(&self, body: Body) -> Result<Bytes, Response> {
        let mut stream = body.into_data_stream();
        let mut buffered = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                tracing::debug!(error = %e, "Failed to read request body");
                json_error(StatusCode::BAD_REQUEST, "Bad request", "Failed to read request body")
            })?;
            if buffered.len() + chunk.len() > self.max_body_size {
                return Err(json_error(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Payload too large",
                    format!("Request body exceeds {} bytes", self.max_body_size),
                ));
            }
            buffered.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buffered))
    }

    fn error_response(&self, request_id: &str, error: &GatewayError, state: CircuitState) -> Response {
        match error {
            GatewayError::CircuitOpen(open) => {
                tracing::warn!(request_id = %request_id, service = %open.service, circuit_state = %state, "Rejected by circuit breaker");
                json_error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable",
                    "Circuit breaker is open",
                )
            }
            GatewayError::Upstream(UpstreamError::Response { status, headers, body }) => {
                passthrough(*status, headers, body.clone())
            }
            GatewayError::ServiceNotFound(service) => json_error(
                StatusCode::NOT_FOUND,
                "Service not found",
                format!("Service '{}' not found", service),
            ),
            GatewayError::UnsupportedMethod(_) => {
                json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", error.to_string())
            }
            GatewayError::ClientUnavailable(_) | GatewayError::Upstream(_) => {
                tracing::error!(request_id = %request_id, error = %error, circuit_state = %state, "Request failed");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "The upstream service could not be reached",
                )
            }
        }
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("prefix", &self.router.prefix())
            .field("breakers", &self.breakers.len())
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}
