//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, security headers, rate limit)
//! - Dispatch `{prefix}/{service}/...` requests to the gateway
//! - Serve with graceful shutdown

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::gateway::RequestDispatcher;
use crate::health;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response::json_error;
use crate::lifecycle::{Gateway, StartupError};
use crate::registry::ServiceRegistry;
use crate::security::{headers::with_security_headers, rate_limit_middleware};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<RequestDispatcher>,
    pub registry: Arc<ServiceRegistry>,
    pub started_at: Instant,
}

/// HTTP front end of the gateway.
pub struct HttpServer {
    router: Router,
    prefix: String,
}

impl HttpServer {
    /// Build the gateway from `config` and the router around it.
    pub fn new(config: GatewayConfig) -> Result<Self, StartupError> {
        Ok(Self::with_gateway(Gateway::build(config)?))
    }

    pub fn with_gateway(gateway: Gateway) -> Self {
        let state = AppState {
            dispatcher: Arc::clone(&gateway.dispatcher),
            registry: Arc::clone(&gateway.registry),
            started_at: Instant::now(),
        };
        let router = Self::build_router(&gateway, state);
        Self {
            router,
            prefix: gateway.config.routing.prefix,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(gateway: &Gateway, state: AppState) -> Router {
        let prefix = gateway.dispatcher.router().prefix().to_string();

        let mut router = Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health::health))
            .route("/health/ready", get(health::ready))
            .route("/health/live", get(health::live))
            .route(&format!("{}/{{service}}", prefix), any(proxy_handler))
            .route(&format!("{}/{{service}}/{{*path}}", prefix), any(proxy_handler))
            .fallback(not_found_handler)
            .with_state(state);

        if let Some(limiter) = &gateway.rate_limiter {
            router = router.layer(middleware::from_fn_with_state(
                Arc::clone(limiter),
                rate_limit_middleware,
            ));
        }

        let router = router
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request.request_id(),
                )
            }))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer());

        if gateway.config.security.enable_headers {
            with_security_headers(router)
        } else {
            router
        }
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, prefix = %self.prefix, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.dispatcher.dispatch(request).await
}

async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    let prefix = state.dispatcher.router().prefix().to_string();
    let services: HashMap<String, String> = state
        .registry
        .all()
        .into_iter()
        .map(|s| {
            let route = format!("{}/{}/*", prefix, s.key);
            (s.key, route)
        })
        .collect();

    Json(json!({
        "service": "API Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "services": services,
        },
    }))
}

async fn not_found_handler(request: Request<Body>) -> Response {
    json_error(
        StatusCode::NOT_FOUND,
        "Not found",
        format!("Route {} {} not found", request.method(), request.uri().path()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::http::request::X_REQUEST_ID;
    use crate::upstream::mock::{self, MockUpstream};
    use crate::upstream::UpstreamClient;
    use tower::ServiceExt;

    fn server(config: GatewayConfig, upstream: Arc<MockUpstream>) -> HttpServer {
        let clients: HashMap<String, Arc<dyn UpstreamClient>> = config
            .services
            .iter()
            .map(|s| (s.key.clone(), Arc::clone(&upstream) as Arc<dyn UpstreamClient>))
            .collect();
        HttpServer::with_gateway(Gateway::with_clients(config, clients).unwrap())
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_proxy_route_and_headers() {
        let upstream = Arc::new(MockUpstream::always(mock::ok("{\"rows\":[]}")));
        let app = server(GatewayConfig::default(), upstream.clone()).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/data/reports?year=2024")
                    .header(X_REQUEST_ID, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(X_REQUEST_ID).unwrap(), "req-42");
        assert_eq!(response.headers().get("x-gateway-service").unwrap(), "data");
        assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");

        let sent = upstream.requests();
        assert_eq!(sent[0].path, "/reports");
        assert_eq!(sent[0].query.as_deref(), Some("year=2024"));
        // The request ID travels upstream.
        assert_eq!(sent[0].headers.get(X_REQUEST_ID).unwrap(), "req-42");
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let upstream = Arc::new(MockUpstream::always(mock::ok("{}")));
        let app = server(GatewayConfig::default(), upstream).router();

        let response = app
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        assert_eq!(json_body(response).await["status"], "alive");
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let upstream = Arc::new(MockUpstream::always(mock::ok("{}")));
        let app = server(GatewayConfig::default(), upstream).router();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"].as_array().unwrap().len(), 3);
        assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());

        let response = app
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ready");
    }

    #[tokio::test]
    async fn test_unknown_routes() {
        let upstream = Arc::new(MockUpstream::always(mock::ok("{}")));
        let app = server(GatewayConfig::default(), upstream.clone()).router();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Not found");

        let response = app
            .oneshot(Request::builder().uri("/api/billing/x").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Service not found");
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_exempts_health() {
        let mut config = GatewayConfig::default();
        config.rate_limit.max_requests = 2;
        let upstream = Arc::new(MockUpstream::always(mock::ok("{}")));
        let app = server(config, upstream).router();

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(Request::builder().uri("/api/ai/x").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/ai/x").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Too many requests");
        assert_eq!(body["message"], "Rate limit exceeded. Please try again later.");

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_prefix_and_root() {
        let mut config = GatewayConfig::default();
        config.routing.prefix = "/gw".into();
        config.services = vec![ServiceConfig {
            key: "search".into(),
            name: "Search".into(),
            base_url: "http://localhost:9200".into(),
            timeout_ms: 1_000,
            max_retries: 0,
            circuit_breaker: Default::default(),
        }];
        let upstream = Arc::new(MockUpstream::always(mock::ok("{}")));
        let app = server(config, upstream.clone()).router();

        let response = app
            .clone()
            .oneshot(Request::builder().method("DELETE").uri("/gw/search/idx/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(upstream.requests()[0].path, "/idx/1");

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "operational");
        assert_eq!(body["endpoints"]["services"]["search"], "/gw/search/*");
    }
}
