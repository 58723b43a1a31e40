//! Gateway request and response value objects.

use std::fmt;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};

use crate::gateway::error::GatewayError;

/// Methods the gateway forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl GatewayMethod {
    /// POST, PUT and PATCH forward the request body; GET and DELETE do not.
    pub fn carries_body(&self) -> bool {
        matches!(self, GatewayMethod::Post | GatewayMethod::Put | GatewayMethod::Patch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayMethod::Get => "GET",
            GatewayMethod::Post => "POST",
            GatewayMethod::Put => "PUT",
            GatewayMethod::Delete => "DELETE",
            GatewayMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for GatewayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&Method> for GatewayMethod {
    type Error = GatewayError;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        match *method {
            Method::GET => Ok(GatewayMethod::Get),
            Method::POST => Ok(GatewayMethod::Post),
            Method::PUT => Ok(GatewayMethod::Put),
            Method::DELETE => Ok(GatewayMethod::Delete),
            Method::PATCH => Ok(GatewayMethod::Patch),
            _ => Err(GatewayError::UnsupportedMethod(method.to_string())),
        }
    }
}

impl From<GatewayMethod> for Method {
    fn from(method: GatewayMethod) -> Self {
        match method {
            GatewayMethod::Get => Method::GET,
            GatewayMethod::Post => Method::POST,
            GatewayMethod::Put => Method::PUT,
            GatewayMethod::Delete => Method::DELETE,
            GatewayMethod::Patch => Method::PATCH,
        }
    }
}

/// An inbound call, resolved to a service and a path relative to it.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub service: String,
    /// Path with the service routing prefix stripped.
    pub path: String,
    pub method: GatewayMethod,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Raw query string without the leading `?`, forwarded byte for byte.
    pub query: Option<String>,
}

impl GatewayRequest {
    /// A bodiless request with no headers or query, mostly useful in tests.
    pub fn new(service: impl Into<String>, method: GatewayMethod, path: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
            method,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            query: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Append a raw `key=value` pair to the query string.
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        let pair = format!("{}={}", key, value);
        self.query = Some(match self.query.take() {
            Some(query) if !query.is_empty() => format!("{}&{}", query, pair),
            _ => pair,
        });
        self
    }
}

/// Timing and origin details attached to a forwarded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    pub service: String,
    /// Time spent in the whole forward call, retries and backoff included.
    pub response_time_ms: u64,
    /// Always false; the gateway has no response cache.
    pub cached: bool,
}

/// Upstream response as returned up the chain.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub data: Bytes,
    pub headers: HeaderMap,
    pub metadata: ResponseMetadata,
}
