//! Per-client rate limiting middleware.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::http::response::json_error;
use crate::observability::metrics;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_per_sec: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct Buckets {
    by_client: HashMap<String, TokenBucket>,
    last_sweep: Instant,
}

/// Token buckets keyed by client IP.
///
/// Each client may burst up to `max_requests`; the bucket refills at
/// `max_requests` per `window_ms`. A bucket left idle for a whole window is
/// full again and gets dropped, at most one sweep per window.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<Buckets>,
    capacity: f64,
    refill_per_sec: f64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.max_requests.max(1));
        let window = Duration::from_millis(config.window_ms.max(1));
        Self {
            buckets: Mutex::new(Buckets {
                by_client: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            capacity,
            refill_per_sec: capacity / window.as_secs_f64(),
            window,
        }
    }

    /// Take one token for `client`. Returns false when the client is over its limit.
    pub fn check(&self, client: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|p| p.into_inner());

        let now = Instant::now();
        if now.duration_since(buckets.last_sweep) >= self.window {
            let window = self.window;
            let before = buckets.by_client.len();
            buckets
                .by_client
                .retain(|_, bucket| now.duration_since(bucket.last_update) < window);
            buckets.last_sweep = now;
            tracing::debug!(
                evicted = before - buckets.by_client.len(),
                remaining = buckets.by_client.len(),
                "Idle rate limit buckets evicted"
            );
        }

        let bucket = buckets
            .by_client
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_acquire(self.capacity, self.refill_per_sec)
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().unwrap_or_else(|p| p.into_inner()).by_client.len()
    }
}

fn is_exempt(path: &str) -> bool {
    path == "/health" || path.starts_with("/health/")
}

fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware function for per-IP rate limiting. Health probes are never limited.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_key(&request);
    if limiter.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        metrics::record_rate_limited("ip_limit");
        json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests",
            "Rate limit exceeded. Please try again later.",
        )
        .into_response()
    }
}
