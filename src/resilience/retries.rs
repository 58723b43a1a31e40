//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether an upstream failure is worth retrying
//! - Run an attempt up to `max_retries + 1` times with fixed backoff
//! - Surface the last failure once attempts are exhausted
//!
//! # Design Decisions
//! - Upstream 4xx responses are client errors and are never retried
//! - Requests that could not be built are never retried
//! - Transport errors, timeouts and 5xx responses are retried
//! - Backoff waits are async sleeps; the worker thread is never blocked

use std::future::Future;

use crate::observability::metrics;
use crate::resilience::backoff::BackoffSchedule;
use crate::upstream::UpstreamError;

/// Returns true if another attempt may succeed where this one failed.
pub fn is_retryable(error: &UpstreamError) -> bool {
    match error {
        UpstreamError::Response { status, .. } => !status.is_client_error(),
        UpstreamError::Timeout(_) | UpstreamError::Transport(_) => true,
        UpstreamError::InvalidRequest(_) => false,
    }
}

/// Retry budget for one forwarded request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub schedule: BackoffSchedule,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, schedule: BackoffSchedule) -> Self {
        Self {
            max_retries,
            schedule,
        }
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent. `attempt` receives the 0-based attempt number.
    pub async fn run<T, F, Fut>(&self, service: &str, mut attempt: F) -> Result<T, UpstreamError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut n = 0;
        loop {
            let error = match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !is_retryable(&error) || n >= self.max_retries {
                return Err(error);
            }

            let delay = self.schedule.delay_for(n);
            tracing::warn!(
                service = %service,
                retry = n + 1,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying upstream request"
            );
            metrics::record_retry(service);
            tokio::time::sleep(delay).await;
            n += 1;
        }
    }
}
