//! Bounded retry with a delay policy.
//!
//! The helper owns only control flow: it runs an operation, asks the caller
//! whether a failure is worth retrying, sleeps according to the policy and
//! reports how the sequence ended.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Delay inserted before each retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial`, then `initial + step`, `initial + 2 * step`, ...
    Linear { initial: Duration, step: Duration },
    /// `initial` doubled per retry, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (0 for the first retry).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Linear { initial, step } => initial + step.saturating_mul(retry),
            Self::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(retry);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Attempt limit plus delay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Single attempt, no retry.
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }
}

/// How a retried operation ended.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded on attempt `attempts`.
    Succeeded { value: T, attempts: u32 },
    /// Every attempt failed with a retryable error.
    Exhausted { error: E, attempts: u32 },
    /// The operation failed with an error the caller does not retry.
    Rejected { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Rejected { attempts, .. } => *attempts,
        }
    }

    /// Collapses the outcome into a plain `Result`.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Exhausted { error, .. } | Self::Rejected { error, .. } => Err(error),
        }
    }
}

/// Runs `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or the policy's attempt limit is reached.
///
/// `operation` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                }
            }
            Err(error) if !should_retry(&error) => {
                return RetryOutcome::Rejected {
                    error,
                    attempts: attempt,
                }
            }
            Err(error) if attempt >= max_attempts => {
                return RetryOutcome::Exhausted {
                    error,
                    attempts: attempt,
                }
            }
            Err(_) => {
                let delay = policy.backoff.delay_for(attempt - 1);
                debug!(attempt, max_attempts, ?delay, "Retrying after failure");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
