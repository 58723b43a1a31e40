//! Outbound HTTP client bound to one upstream service.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::{HeaderValue, CONTENT_TYPE};
use axum::http::HeaderMap;
use url::Url;

use crate::upstream::types::{OutboundRequest, UpstreamError, UpstreamResponse};

/// Transport used by the forwarder for one service.
///
/// Implementations turn 4xx/5xx answers into `UpstreamError::Response` so
/// retry classification can match on the failure alone.
#[async_trait]
pub trait UpstreamClient: Send + Sync + fmt::Debug {
    /// Issue a single attempt. No retries happen at this level.
    async fn send(&self, request: &OutboundRequest) -> Result<UpstreamResponse, UpstreamError>;
}

/// `reqwest`-backed client with a fixed base URL and timeout.
///
/// Built once per service at startup; the inner connection pool is reused
/// for every request.
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| UpstreamError::InvalidRequest(format!("base URL '{}': {}", base_url, e)))?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .default_headers(default_headers)
            .pool_idle_timeout(Duration::from_secs(90))
            // Upstreams are internal services; never route them via HTTP(S)_PROXY.
            .no_proxy()
            .build()
            .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Join the base URL, a service-relative path and an optional raw query.
    pub fn url_for(&self, path: &str, query: Option<&str>) -> String {
        let mut url = if path.is_empty() {
            self.base_url.clone()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    fn classify(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else if error.is_builder() {
            UpstreamError::InvalidRequest(error.to_string())
        } else {
            UpstreamError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn send(&self, request: &OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.url_for(&request.path, request.query.as_deref());
        tracing::debug!(method = %request.method, url = %url, "Outbound request");

        let mut builder = self
            .client
            .request(request.method.into(), url.as_str())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        tracing::debug!(status = %status, url = %url, "Response received");

        if status.is_client_error() || status.is_server_error() {
            return Err(UpstreamError::Response {
                status,
                headers,
                body,
            });
        }

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

impl fmt::Debug for HttpUpstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpUpstream")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout.as_millis())
            .finish()
    }
}
