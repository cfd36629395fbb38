//! Circuit breaker guarding calls to the remote service.

use crate::error::FusionError;
use metrics::counter;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected without reaching the backend.
    Open,
    /// A single trial request is let through to test recovery.
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

/// Three-state breaker driven by consecutive backend failures.
///
/// State transitions are evaluated synchronously on each call; there is no
/// background timer. Only errors that indicate a struggling backend
/// (network, timeout, 5xx) count as failures. Any other outcome proves the
/// backend answered and counts as a success.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

impl CircuitBreaker {
    /// Opens after `threshold` consecutive failures and lets a trial call through
    /// once `timeout` has elapsed since the last failure.
    pub fn new(threshold: u32, timeout: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            timeout,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Current state, applying a pending Open -> HalfOpen transition
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Time left before an open circuit admits a trial
    pub fn time_until_half_open(&self) -> Option<Duration> {
        let inner = self.lock();
        match (inner.state, inner.last_failure) {
            (CircuitState::Open, Some(at)) => Some(self.timeout.saturating_sub(at.elapsed())),
            _ => None,
        }
    }

    /// Run `operation` under the breaker.
    ///
    /// Returns [`FusionError::ServiceUnavailable`] without invoking the
    /// operation when the circuit is open.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, FusionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FusionError>>,
    {
        let mut permit = self.try_acquire()?;
        let result = operation().await;

        match &result {
            Ok(_) => permit.succeed(),
            Err(err) if counts_as_failure(err) => permit.fail(),
            Err(_) => permit.succeed(),
        }

        result
    }

    /// Reserve the right to make one call.
    ///
    /// The returned permit must be resolved with [`Permit::succeed`] or
    /// [`Permit::fail`]; dropping it unresolved releases a half-open trial
    /// slot without changing state.
    pub fn try_acquire(&self) -> Result<Permit<'_>, FusionError> {
        let mut inner = self.lock();
        self.refresh(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(Permit::new(self, false)),
            CircuitState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                log::debug!("Circuit half-open, letting a trial request through");
                Ok(Permit::new(self, true))
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                counter!("fusion_circuit_rejections_total").increment(1);
                let retry_in = inner
                    .last_failure
                    .map(|at| self.timeout.saturating_sub(at.elapsed()));
                Err(FusionError::service_unavailable(retry_in))
            }
        }
    }

    /// Record a successful call.
    ///
    /// Closes a half-open circuit. An open circuit stays open: only a trial
    /// admitted after the timeout may close it.
    pub fn record_success(&self) {
        self.on_success(true);
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {}
            CircuitState::HalfOpen if trial => {
                log::info!("Circuit breaker closed after successful trial");
            }
            CircuitState::Open | CircuitState::HalfOpen => {
                log::debug!("Ignoring success of a call admitted before the circuit opened");
                return;
            }
        }
        Self::close(&mut inner);
    }

    fn close(inner: &mut Inner) {
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.trial_in_flight = false;
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.trial_in_flight = false;

        let reopen = inner.state == CircuitState::HalfOpen;
        if reopen || inner.failure_count >= self.threshold {
            if inner.state != CircuitState::Open {
                log::warn!(
                    "Circuit breaker opened after {} consecutive failures",
                    inner.failure_count
                );
            }
            inner.state = CircuitState::Open;
        }
    }

    /// Force the breaker back to a pristine closed state
    pub fn reset(&self) {
        Self::close(&mut self.lock());
    }

    fn refresh(&self, inner: &mut Inner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let expired = match inner.last_failure {
            Some(at) => at.elapsed() >= self.timeout,
            None => true,
        };
        if expired {
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn counts_as_failure(err: &FusionError) -> bool {
    err.is_retryable()
}

/// Admission ticket handed out by [`CircuitBreaker::try_acquire`]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    resolved: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            resolved: false,
        }
    }

    pub fn succeed(&mut self) {
        self.resolved = true;
        self.breaker.on_success(self.trial);
    }

    pub fn fail(&mut self) {
        self.resolved = true;
        self.breaker.record_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.resolved {
            self.breaker.lock().trial_in_flight = false;
        }
    }
}
