//! Exponential backoff for best-effort deliveries.
//!
//! Notification and calendar calls are retried a few times before the
//! failure is logged and dropped. Nothing here touches the store: a
//! delivery that gives up never undoes the write that triggered it.
//!
//! # Example
//!
//! ```rust
//! use chairbook_runtime::retry::{RetryPolicy, retry_with_backoff};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(2)
//!     .initial_delay(Duration::from_millis(50))
//!     .build();
//!
//! let receipt = retry_with_backoff(&policy, "reminder", || async {
//!     Ok::<_, String>("msg-1")
//! })
//! .await?;
//! # let _ = receipt;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff configuration.
///
/// Defaults: 3 retries, 200ms first delay, doubling, capped at 5 seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Growth factor between retries
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Start from the defaults.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// A single attempt, no retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based), capped at `max_delay`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        if !millis.is_finite() || millis >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(millis as u64)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Retries after the first attempt
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Delay before the first retry
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Cap on a single delay
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Growth factor
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// `label` names the delivery in logs.
///
/// # Errors
///
/// Returns the last error once every retry has failed.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if retry > 0 {
                    tracing::debug!(delivery = label, retries = retry, "Delivery succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if retry >= policy.max_retries => {
                tracing::warn!(
                    delivery = label,
                    attempts = retry + 1,
                    error = %err,
                    "Delivery gave up"
                );
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_for_attempt(retry);
                tracing::debug!(
                    delivery = label,
                    retry,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Delivery failed, retrying"
                );
                sleep(delay).await;
                retry += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(retries: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(retries)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .build()
    }

    #[test]
    fn delays_double_up_to_the_cap() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(500))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn recovers_from_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = retry_with_backoff(&fast(3), "test", || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("provider busy".to_string())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = retry_with_backoff(&fast(2), "test", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("down")
            }
        })
        .await;

        assert_eq!(result, Err("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_retry_makes_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let _ = retry_with_backoff(&RetryPolicy::no_retry(), "test", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("down")
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
