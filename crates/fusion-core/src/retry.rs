use crate::config::FusionConfig;
use crate::error::FusionError;
use metrics::counter;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Exponential backoff with optional jitter.
///
/// Only errors for which [`FusionError::is_retryable`] holds are retried; any
/// other error, and the error of the final attempt, is returned unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_factor: Duration, max_backoff: Duration, jitter: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_factor,
            max_backoff,
            jitter,
        }
    }

    /// Policy that tries exactly once
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// `max_retries` is the total attempt budget, with a floor of one attempt.
    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_secs_f64(config.retry_backoff_seconds),
            Duration::from_secs_f64(config.retry_max_backoff_seconds),
            config.retry_jitter,
        )
    }

    /// Deterministic part of the delay after the given zero-based attempt
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = 2u32.saturating_pow(attempt);
        self.backoff_factor
            .checked_mul(exp)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Delay to sleep after the given zero-based attempt, jitter included
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if self.jitter {
            let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent.
    ///
    /// For streaming requests the operation should cover connection
    /// establishment only, so a stream is never replayed halfway through.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, FusionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FusionError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.delay_for(attempt);
                    log::warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt + 1,
                        max_attempts,
                        err,
                        delay
                    );
                    counter!("fusion_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
