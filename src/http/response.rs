//! Response construction.
//!
//! # Responsibilities
//! - Uniform JSON error body for every gateway-originated failure
//! - Turn a forwarded upstream response into an axum response
//!
//! # Design Decisions
//! - Upstream error bodies are passed through verbatim, never rewrapped
//! - Internal failure details stay in logs, not in response bodies

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::security::headers::{response_headers, X_GATEWAY_RESPONSE_TIME, X_GATEWAY_SERVICE};

/// `{"error": ..., "message": ...}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

pub fn json_error(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: error.into(),
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

/// Build a response from upstream parts, keeping only end-to-end headers.
pub fn passthrough(status: StatusCode, upstream_headers: &HeaderMap, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers(upstream_headers);
    response
}

/// Tag a response with the serving service and elapsed time.
pub fn with_gateway_headers(mut response: Response, service: &str, response_time_ms: u64) -> Response {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(service) {
        headers.insert(X_GATEWAY_SERVICE, value);
    }
    headers.insert(X_GATEWAY_RESPONSE_TIME, HeaderValue::from(response_time_ms));
    response
}
