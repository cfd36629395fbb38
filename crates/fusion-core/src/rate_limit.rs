//! Sliding-window admission control.
//!
//! A [`RateLimiter`] admits at most `max_calls` calls in any trailing `window`.
//! Callers over budget are suspended, never rejected. Admission is ordered by
//! timestamp only: a waiter that wakes up re-checks the window and may be
//! overtaken by a fresh arrival, so there is no strict FIFO fairness.

use crate::error::FusionError;
use metrics::counter;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Slack added to every computed wait so the oldest call has surely expired
const WAIT_BUFFER: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_calls` per `window`.
    ///
    /// A zero budget is rejected here because it could never admit a call.
    pub fn new(max_calls: u32, window: Duration) -> Result<Self, FusionError> {
        if max_calls == 0 {
            return Err(FusionError::configuration(
                "Rate limiter requires max_calls > 0",
            ));
        }

        Ok(Self {
            max_calls: max_calls as usize,
            window,
            calls: Mutex::new(VecDeque::with_capacity(max_calls as usize)),
        })
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a call fits in the window, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.lock();
                let now = Instant::now();
                self.prune(&mut calls, now);

                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    return;
                }

                // Pruning guarantees the front entry is still inside the window
                let oldest = calls.front().copied().unwrap_or(now);
                self.window.saturating_sub(now - oldest) + WAIT_BUFFER
            };

            log::debug!(
                "Rate limit of {} calls per {:?} reached, waiting {:?}",
                self.max_calls,
                self.window,
                wait
            );
            counter!("fusion_rate_limit_waits_total").increment(1);
            tokio::time::sleep(wait).await;
        }
    }

    /// Non-blocking check whether a call would be admitted right now
    pub fn can_proceed(&self) -> bool {
        let mut calls = self.lock();
        self.prune(&mut calls, Instant::now());
        calls.len() < self.max_calls
    }

    /// Time until the next call would be admitted, zero if one is available now
    pub fn time_until_available(&self) -> Duration {
        let mut calls = self.lock();
        let now = Instant::now();
        self.prune(&mut calls, now);

        if calls.len() < self.max_calls {
            return Duration::ZERO;
        }

        match calls.front() {
            Some(oldest) => self.window.saturating_sub(now - *oldest),
            None => Duration::ZERO,
        }
    }

    /// Number of calls currently counted against the window
    pub fn in_flight(&self) -> usize {
        let mut calls = self.lock();
        self.prune(&mut calls, Instant::now());
        calls.len()
    }

    fn prune(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = calls.front() {
            if now - *oldest > self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        // The deque holds plain timestamps, so a poisoned lock is still consistent
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn zero_budget_is_rejected() {
        let err = RateLimiter::new(0, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FusionError::Configuration { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn admits_budget_without_delay() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10)).unwrap();
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.in_flight(), 3);
        assert!(!limiter.can_proceed());
    }

    #[tokio::test(start_paused = true)]
    async fn call_over_budget_waits_for_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10)).unwrap();
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        let waited = start.elapsed();

        // Oldest call was 4s old, so about 6s of the window remained
        assert!(waited >= Duration::from_secs(6), "waited {waited:?}");
        assert!(waited <= Duration::from_secs(6) + WAIT_BUFFER * 2, "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_frees_slots() {
        let limiter = RateLimiter::new(1, Duration::from_secs(5)).unwrap();
        limiter.acquire().await;
        assert!(!limiter.can_proceed());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(limiter.can_proceed());
        assert_eq!(limiter.time_until_available(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn time_until_available_tracks_oldest_call() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10)).unwrap();
        assert_eq!(limiter.time_until_available(), Duration::ZERO);

        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(limiter.time_until_available(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_never_exceed_budget() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)).unwrap());
        let start = Instant::now();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap() - start);
        }
        admitted.sort();

        // Any window of one second holds at most two admissions
        for pair in admitted.windows(3) {
            assert!(pair[2] - pair[0] > Duration::from_secs(1), "{admitted:?}");
        }
    }
}
