//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: a single trial request tests whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: on the next call once reset_timeout has elapsed since the last failure
//! Half-Open → Closed: trial request succeeds
//! Half-Open → Open: trial request fails
//! ```
//!
//! # Design Decisions
//! - Per-service circuit breaker (not global)
//! - Fail fast in Open state (the wrapped operation is never invoked)
//! - Single trial in Half-Open; concurrent callers are refused while it runs
//! - All state sits behind one mutex that is never held across an await

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when the breaker refuses a call without invoking it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker for '{service}' is open")]
pub struct CircuitOpenError {
    pub service: String,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

/// Failure-tracking state machine guarding calls to one upstream.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerState>,
}

/// How a call was let through. Only a trial outcome may move the breaker
/// out of half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// Releases the half-open trial slot if the trial future is dropped early.
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.breaker.lock();
            inner.trial_in_flight = false;
            tracing::debug!(service = %self.breaker.service, "Trial call abandoned, releasing slot");
        }
    }
}

impl CircuitBreaker {
    /// Create a closed breaker for `service`.
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: config.reset_timeout(),
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Run `operation` through the breaker.
    ///
    /// The operation's own error is returned unchanged. When the breaker
    /// refuses the call the operation is not invoked and
    /// `E::from(CircuitOpenError)` is returned instead.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        let admission = self.admit()?;
        let mut slot = match admission {
            Admission::Normal => None,
            Admission::Trial => Some(TrialSlot {
                breaker: self,
                armed: true,
            }),
        };

        let result = operation().await;

        if let Some(slot) = slot.as_mut() {
            slot.armed = false;
        }
        match &result {
            Ok(_) => self.on_success(admission),
            Err(_) => self.on_failure(admission),
        }
        result
    }

    /// Current state. Read-only: an elapsed reset timeout is only acted on by
    /// the next `execute`.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    fn admit(&self) -> Result<Admission, CircuitOpenError> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let eligible = inner
                    .last_failure
                    .map(|at| at.elapsed() > self.reset_timeout)
                    .unwrap_or(true);
                if !eligible {
                    return Err(self.open_error());
                }
                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.trial_in_flight = true;
                Ok(Admission::Trial)
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(self.open_error());
                }
                inner.trial_in_flight = true;
                Ok(Admission::Trial)
            }
        }
    }

    fn on_success(&self, admission: Admission) {
        let mut inner = self.lock();
        match (admission, inner.state) {
            (Admission::Normal, CircuitState::Closed) => inner.failure_count = 0,
            (Admission::Trial, CircuitState::HalfOpen) => {
                inner.failure_count = 0;
                inner.trial_in_flight = false;
                self.transition(&mut inner, CircuitState::Closed);
            }
            // Admitted before the circuit left CLOSED. Too late to count.
            _ => {}
        }
    }

    fn on_failure(&self, admission: Admission) {
        let mut inner = self.lock();
        match (admission, inner.state) {
            (Admission::Normal, CircuitState::Closed) => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                inner.last_failure = Some(Instant::now());
                if inner.failure_count >= self.failure_threshold {
                    tracing::warn!(
                        service = %self.service,
                        failures = inner.failure_count,
                        threshold = self.failure_threshold,
                        "Circuit breaker opened"
                    );
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            (Admission::Trial, CircuitState::HalfOpen) => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                inner.last_failure = Some(Instant::now());
                inner.trial_in_flight = false;
                tracing::warn!(service = %self.service, "Trial call failed, circuit breaker reopened");
                self.transition(&mut inner, CircuitState::Open);
            }
            _ => {}
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        tracing::info!(service = %self.service, from = %from, to = %to, "Circuit breaker state change");
        metrics::record_circuit_state(&self.service, to);
    }

    fn open_error(&self) -> CircuitOpenError {
        CircuitOpenError {
            service: self.service.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // The state is plain data and stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Boom,
        Open,
    }

    impl From<CircuitOpenError> for TestError {
        fn from(_: CircuitOpenError) -> Self {
            TestError::Open
        }
    }

    fn breaker(threshold: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout_ms: reset_ms,
            },
        )
    }

    async fn fail(breaker: &CircuitBreaker, calls: &AtomicU32) -> Result<(), TestError> {
        breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError::Boom)
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, calls: &AtomicU32) -> Result<u32, TestError> {
        breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(7)
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold_and_fails_fast() {
        let breaker = breaker(3, 1000);
        let calls = AtomicU32::new(0);

        for i in 1..=3 {
            assert_eq!(fail(&breaker, &calls).await, Err(TestError::Boom));
            assert_eq!(breaker.failure_count(), i);
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Refused without invoking the operation.
        assert_eq!(succeed(&breaker, &calls).await, Err(TestError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_scenario() {
        let breaker = breaker(3, 1000);
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let _ = fail(&breaker, &calls).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(succeed(&breaker, &calls).await, Err(TestError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(succeed(&breaker, &calls).await, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens() {
        let breaker = breaker(2, 1000);
        let calls = AtomicU32::new(0);

        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert_eq!(fail(&breaker, &calls).await, Err(TestError::Boom));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.failure_count(), 3);

        // The failed trial restarts the reset window.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(succeed(&breaker, &calls).await, Err(TestError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_timeout_is_strict() {
        let breaker = breaker(1, 1000);
        let calls = AtomicU32::new(0);

        let _ = fail(&breaker, &calls).await;
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(succeed(&breaker, &calls).await, Err(TestError::Open));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(succeed(&breaker, &calls).await, Ok(7));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = breaker(3, 1000);
        let calls = AtomicU32::new(0);

        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.failure_count(), 2);

        assert_eq!(succeed(&breaker, &calls).await, Ok(7));
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);

        // Two more failures stay below the threshold again.
        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trial_in_half_open() {
        let breaker = Arc::new(breaker(1, 100));
        let calls = Arc::new(AtomicU32::new(0));

        let _ = fail(&breaker, &calls).await;
        tokio::time::advance(Duration::from_millis(101)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let trial = {
            let breaker = breaker.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                breaker
                    .execute(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _ = release_rx.await;
                        Ok::<_, TestError>(1)
                    })
                    .await
            })
        };

        // Let the trial get admitted.
        tokio::task::yield_now().await;
        while calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert_eq!(succeed(&breaker, &calls).await, Err(TestError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        release_tx.send(()).unwrap();
        assert_eq!(trial.await.unwrap(), Ok(1));
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    type Held = (
        tokio::sync::oneshot::Sender<()>,
        tokio::task::JoinHandle<Result<u32, TestError>>,
    );

    /// Start a call that stays in flight until released, then returns `outcome`.
    async fn hold(breaker: &Arc<CircuitBreaker>, calls: &Arc<AtomicU32>, outcome: Result<u32, TestError>) -> Held {
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let before = calls.load(Ordering::SeqCst);
        let handle = {
            let breaker = Arc::clone(breaker);
            let calls = Arc::clone(calls);
            tokio::spawn(async move {
                breaker
                    .execute(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _ = release_rx.await;
                        outcome
                    })
                    .await
            })
        };
        while calls.load(Ordering::SeqCst) == before {
            tokio::task::yield_now().await;
        }
        (release_tx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_does_not_override_trial() {
        let breaker = Arc::new(breaker(1, 100));
        let calls = Arc::new(AtomicU32::new(0));

        // Admitted while closed, finishes during the trial.
        let (release_late, late) = hold(&breaker, &calls, Err(TestError::Boom)).await;
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(101)).await;
        let (release_trial, trial) = hold(&breaker, &calls, Ok(1)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        release_late.send(()).unwrap();
        assert_eq!(late.await.unwrap(), Err(TestError::Boom));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        // The trial still holds the only slot.
        assert_eq!(succeed(&breaker, &calls).await, Err(TestError::Open));

        release_trial.send(()).unwrap();
        assert_eq!(trial.await.unwrap(), Ok(1));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_success_does_not_close_during_trial() {
        let breaker = Arc::new(breaker(1, 100));
        let calls = Arc::new(AtomicU32::new(0));

        let (release_late, late) = hold(&breaker, &calls, Ok(5)).await;
        let _ = fail(&breaker, &calls).await;

        tokio::time::advance(Duration::from_millis(101)).await;
        let (release_trial, trial) = hold(&breaker, &calls, Err(TestError::Boom)).await;

        release_late.send(()).unwrap();
        assert_eq!(late.await.unwrap(), Ok(5));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        release_trial.send(()).unwrap();
        assert_eq!(trial.await.unwrap(), Err(TestError::Boom));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_releases_slot() {
        let breaker = breaker(1, 100);
        let calls = AtomicU32::new(0);

        let _ = fail(&breaker, &calls).await;
        tokio::time::advance(Duration::from_millis(101)).await;

        let pending = breaker.execute(|| std::future::pending::<Result<(), TestError>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert_eq!(succeed(&breaker, &calls).await, Ok(7));
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_concurrent_failures_open_exactly_at_threshold() {
        let breaker = Arc::new(breaker(10, 60_000));
        let calls = Arc::new(AtomicU32::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let breaker = breaker.clone();
                let calls = calls.clone();
                tokio::spawn(async move { fail(&breaker, &calls).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), Err(TestError::Boom));
        }

        assert_eq!(breaker.failure_count(), 10);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(succeed(&breaker, &calls).await, Err(TestError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }
}
