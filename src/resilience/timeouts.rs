//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every upstream attempt by the service's configured timeout
//! - Map an elapsed deadline to a distinct, retryable timeout error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - The deadline applies per attempt, not to the whole retry sequence

use std::future::Future;
use std::time::Duration;

use crate::upstream::UpstreamError;

/// Run one upstream attempt with a deadline.
pub async fn with_timeout<T, Fut>(timeout: Duration, attempt: Fut) -> Result<T, UpstreamError>
where
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout(timeout)),
    }
}
