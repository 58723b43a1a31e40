//! Transport-level request, response and failure types.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::gateway::request::{GatewayMethod, GatewayRequest};
use crate::security::headers::outbound_headers;

/// One HTTP request as sent to an upstream, relative to its base URL.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: GatewayMethod,
    pub path: String,
    /// Raw query string, appended to the URL unchanged.
    pub query: Option<String>,
    pub headers: HeaderMap,
    /// Present only for methods that carry a body.
    pub body: Option<Bytes>,
}

impl From<&GatewayRequest> for OutboundRequest {
    fn from(request: &GatewayRequest) -> Self {
        Self {
            method: request.method,
            path: request.path.clone(),
            query: request.query.clone(),
            headers: outbound_headers(&request.headers),
            body: request
                .method
                .carries_body()
                .then(|| request.body.clone()),
        }
    }
}

/// Successful (non-error status) upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Why an upstream attempt failed.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// The upstream answered with a 4xx or 5xx status.
    #[error("upstream responded with status {status}")]
    Response {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },

    /// No response within the service timeout.
    #[error("upstream timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Connection refused, reset, DNS failure or a broken response stream.
    #[error("upstream unreachable: {0}")]
    Transport(String),

    /// The outbound request could not be built.
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

impl UpstreamError {
    /// Upstream status, when the failure carries a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}
