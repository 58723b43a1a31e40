//! Header manipulation and security headers.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Keep gateway-internal headers from reaching upstreams
//! - Add security response headers (optional)
//!
//! # Design Decisions
//! - `host` and `content-length` are recomputed by the outbound client
//! - Security headers never override ones the upstream already set

use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::HeaderMap;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

/// Header naming the service that handled the request.
pub const X_GATEWAY_SERVICE: &str = "x-gateway-service";
/// Header carrying the end-to-end response time in milliseconds.
pub const X_GATEWAY_RESPONSE_TIME: &str = "x-gateway-response-time";

const GATEWAY_HEADER_PREFIX: &str = "x-gateway-";

const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name.as_str() == "keep-alive"
}

/// Headers to forward from an inbound request to an upstream.
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_hop_by_hop(name)
            || name == header::HOST
            || name == header::CONTENT_LENGTH
            || name.as_str().starts_with(GATEWAY_HEADER_PREFIX)
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Headers to copy from an upstream response onto the gateway response.
pub fn response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Add security response headers to every route of `router`.
pub fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
}
