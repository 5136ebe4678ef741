//! Retry helper for callers that want resilience around cache calls.
//!
//! The cache itself never retries; store failures are surfaced once.

use crate::error::{CacheError, CacheResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay every time.
    Constant(Duration),
    /// Delay multiplied after every attempt, capped at `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Backoff {
    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::Constant(d) => *d,
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
                let millis = initial.as_millis() as f64 * factor;
                if !millis.is_finite() || millis >= max.as_millis() as f64 {
                    *max
                } else {
                    Duration::from_millis(millis as u64)
                }
            }
        }
    }
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Retry only store failures; validation and codec errors fail at once
    pub store_errors_only: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(100))
    }
}

impl RetryPolicy {
    /// Fixed delay between attempts.
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Constant(delay),
            store_errors_only: true,
        }
    }

    /// Doubling delay, capped at 10 seconds.
    pub fn exponential(max_attempts: u32, initial: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                initial,
                max: Duration::from_secs(10),
                multiplier: 2.0,
            },
            store_errors_only: true,
        }
    }

    /// Retry every kind of error, not just store failures.
    pub fn retry_all_errors(mut self) -> Self {
        self.store_errors_only = false;
        self
    }

    fn should_retry(&self, err: &CacheError) -> bool {
        !self.store_errors_only || err.is_store()
    }
}

/// Run `op` until it succeeds or the policy gives up, returning the last
/// error.
///
/// # Examples
///
/// ```
/// use cachet_cache::retry::{RetryPolicy, retry};
/// use cachet_cache::*;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), CacheError> {
/// let cache = Cache::in_memory(CacheConfig::default().with_warmup(false))?;
/// let policy = RetryPolicy::constant(3, Duration::from_millis(10));
///
/// retry(&policy, || cache.set("k", &1, SetOptions::new())).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> CacheResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CacheResult<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < attempts && policy.should_retry(&err) => {
                let delay = policy.backoff.delay_for_attempt(attempt);
                warn!(attempt = attempt + 1, delay = ?delay, error = %err, "Retrying cache call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
