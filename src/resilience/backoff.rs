//! Fixed backoff schedule between retries.

use std::time::Duration;

use crate::config::RetryConfig;

/// Ordered retry delays with a fallback for retries past the end.
///
/// No jitter: the n-th retry always waits the same amount of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
    fallback: Duration,
}

impl BackoffSchedule {
    pub fn new(delays: Vec<Duration>, fallback: Duration) -> Self {
        Self { delays, fallback }
    }

    /// Delay before retry number `retry` (0-based: 0 is the first retry).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.delays
            .get(retry as usize)
            .copied()
            .unwrap_or(self.fallback)
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for BackoffSchedule {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.delays_ms.iter().copied().map(Duration::from_millis).collect(),
            Duration::from_millis(config.fallback_delay_ms),
        )
    }
}
