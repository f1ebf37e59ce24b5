//! Retry policy implementation.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry policy: a fixed number of attempts separated by a uniformly random
/// pause in `[0, max_jitter]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Zero behaves as one.
    pub max_attempts: u32,
    /// Upper bound of the random pause between attempts.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_jitter: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt count and jitter bound.
    #[must_use]
    pub const fn new(max_attempts: u32, max_jitter: Duration) -> Self {
        Self {
            max_attempts,
            max_jitter,
        }
    }

    /// Creates a new retry policy with the specified max attempts.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Draws the pause before the next attempt.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let max_micros = u64::try_from(self.max_jitter.as_micros()).unwrap_or(u64::MAX);
        if max_micros == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::thread_rng().gen_range(0..=max_micros))
    }

    /// Runs `f` until it succeeds or the attempts are exhausted, returning
    /// the last error in the latter case.
    pub async fn execute<F, Fut, T, E>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if attempt >= attempts => {
                    debug!(attempt, error = %e, "Giving up after final attempt");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.next_delay();
                    debug!(attempt, ?delay, error = %e, "Attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
