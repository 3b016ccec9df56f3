//! Bounded retry with exponential backoff
//!
//! Network calls get a small retry budget for transient failures; anything
//! [`CatalogError::is_retryable`] rejects is returned on the first attempt.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::{CatalogError, CatalogResult};
use crate::infrastructure::config::HttpConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_http_config(config: &HttpConfig) -> Self {
        Self::new(config.max_retries, config.retry_base_delay())
    }

    /// No retries, no waiting
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1) plus jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = self.base_delay.saturating_mul(1 << exponent);
        let jitter_ms = u64::try_from(self.base_delay.as_millis() / 4).unwrap_or(0);
        if jitter_ms == 0 {
            delay
        } else {
            delay + Duration::from_millis(fastrand::u64(0..=jitter_ms))
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget is spent
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> CatalogResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = CatalogResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", what, attempt);
                    }
                    return Ok(value);
                }
                Err(error) if error.is_retryable() && attempt <= self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt,
                        self.max_retries + 1,
                        error,
                        delay
                    );
                    sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_http_config(&HttpConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_failures_up_to_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO);

        let result: CatalogResult<()> = policy
            .run("fetch", |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CatalogError::FetchTimeout { url: "u".into() })
            })
            .await;

        assert!(matches!(result, Err(CatalogError::FetchTimeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let result = policy
            .run("fetch", |attempt| async move {
                if attempt == 1 {
                    Err(CatalogError::fetch_unavailable("u", "502"))
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let result: CatalogResult<()> = policy
            .run("parse", |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CatalogError::invalid_price("n/a"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(2));
        // jitter is base/4 = 0ms for a 2ms base
        assert_eq!(policy.backoff(1), Duration::from_millis(2));
        assert_eq!(policy.backoff(2), Duration::from_millis(4));
        assert_eq!(policy.backoff(3), Duration::from_millis(8));
    }
}
