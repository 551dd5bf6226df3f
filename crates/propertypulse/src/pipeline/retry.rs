use std::future::Future;
use std::time::Duration;

use log::warn;
use tokio_util::sync::CancellationToken;

use super::pool::{PoolClosed, WorkerPool};
use crate::adapters::Retryable;
use crate::config::RetryConfig;

/// Exponential backoff with a ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            multiplier: 2.0,
            max: Duration::from_secs(8),
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(30) as i32;
        let millis = self.initial.as_millis() as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(millis as u64).min(self.max)
    }
}

/// Per-call retry budget applied at every adapter call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

/// Outcome of a call that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError<E> {
    /// The job was cancelled; any result is abandoned.
    Cancelled,
    Failed { error: E, attempts: u32 },
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_retries.saturating_add(1),
            backoff: Backoff {
                initial: Duration::from_millis(config.initial_backoff_ms),
                multiplier: config.multiplier,
                max: Duration::from_millis(config.max_backoff_ms),
            },
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Runs `make_call` through the pool until it succeeds, fails
    /// permanently, exhausts the budget or `cancel` fires. Each attempt
    /// holds one pool slot; backoff sleeps hold none.
    pub async fn call<T, E, F, Fut>(
        &self,
        pool: &WorkerPool,
        cancel: &CancellationToken,
        label: &str,
        mut make_call: F,
    ) -> Result<T, CallError<E>>
    where
        E: Retryable + From<PoolClosed> + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CallError::Cancelled),
                outcome = pool.run(make_call()) => outcome,
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                return Err(CallError::Failed {
                    error,
                    attempts: attempt,
                });
            }

            let delay = self.backoff.delay_for(attempt);
            warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                label, attempt, max_attempts, error, delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CallError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
