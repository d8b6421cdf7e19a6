//! Pacing and retry utilities for browser sessions.
//!
//! [`Pacing`] injects a randomized delay before scroll and navigation
//! actions. [`retry_with_backoff`] retries session creation with an
//! exponential schedule.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::DriverError;

/// Randomized delay window applied before paced browser actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    /// Builds a window; the bounds are swapped if given out of order.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// A uniformly random delay within the window.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.max.is_zero() || self.min == self.max {
            return self.min;
        }
        let millis = |d: Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        let (lo, hi) = (millis(self.min), millis(self.max));
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }

    /// Sleeps for a sampled delay.
    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Executes `operation` with exponential backoff on failure.
///
/// The operation is attempted at most `1 + max_retries` times. Before the
/// n-th retry the function sleeps `backoff_base * 2^(n-1)`, capped at 30 s.
/// Returns the last error together with the number of attempts made.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base: Duration,
    mut operation: F,
) -> Result<T, (DriverError, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DriverError>>,
{
    const MAX_DELAY: Duration = Duration::from_secs(30);
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_retries {
                    return Err((err, attempt + 1));
                }
                let delay = backoff_base
                    .saturating_mul(1u32 << attempt.min(16))
                    .min(MAX_DELAY);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "session open failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
