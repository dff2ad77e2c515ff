//! Retry policy with capped exponential backoff

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently an operation is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_cap_ms),
        }
    }
}

/// Why a retried operation gave up
#[derive(Debug, PartialEq, Eq)]
pub enum RetryFailure<E> {
    /// The error was not retryable; returned after the attempt that raised it
    Permanent(E),
    /// Every attempt failed with a retryable error; carries the last one
    Exhausted { attempts: u32, last: E },
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based)
    ///
    /// 1 → base, 2 → 2×base, 3 → 4×base, ... never above `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Runs `operation` until it succeeds, fails permanently, or runs out of attempts
    ///
    /// `is_retryable` decides which errors are worth another attempt.
    pub async fn run<T, E, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Result<T, RetryFailure<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !is_retryable(&e) => return Err(RetryFailure::Permanent(e)),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(RetryFailure::Exhausted { attempts: attempt, last: e })
                }
                Err(_) => {
                    let delay = self.delay_after(attempt);
                    tracing::trace!("Attempt {} failed, retrying in {:?}", attempt, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
