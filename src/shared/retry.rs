//! Retry with exponential backoff
//!
//! Used wherever a transient store failure must not be fatal: the expiry
//! and no-show sweeps, and the payment callback boundary. Exhaustion is
//! logged at error level because it can leave a reservation stuck past its
//! deadline.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use super::errors::DomainError;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_multiplier: f64,
    /// Maximum delay between retries (cap).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Single attempt, no sleeping. Handy in tests.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay.as_secs_f64()),
        )
    }
}

/// Execute an async operation with exponential backoff retry.
///
/// `should_retry` decides whether an error is transient (retry) or
/// permanent (return immediately, no error log).
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !should_retry(&err) {
            return Err(err);
        }

        if attempt >= max_attempts {
            error!(
                operation = operation_name,
                attempt,
                max_attempts,
                error = %err,
                "Retries exhausted"
            );
            return Err(err);
        }

        warn!(
            operation = operation_name,
            attempt,
            max_attempts,
            error = %err,
            retry_in_ms = delay.as_millis() as u64,
            "Transient failure, retrying"
        );

        tokio::time::sleep(delay).await;
        delay = config.next_delay(delay);
        attempt += 1;
    }
}

/// [`retry_with_backoff`] for domain operations: only
/// [`DomainError::is_transient`] errors are retried.
pub async fn retry_transient<F, Fut, T>(
    config: &RetryConfig,
    operation: F,
    operation_name: &str,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    retry_with_backoff(config, operation, DomainError::is_transient, operation_name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_transient(
            &fast(),
            || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DomainError::StoreUnavailable("busy".into()))
                } else {
                    Ok(7)
                }
            },
            "test",
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_transient(
            &fast(),
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DomainError::Validation("bad".into()))
            },
            "test",
        )
        .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_transient(
            &fast(),
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DomainError::StoreUnavailable("down".into()))
            },
            "test",
        )
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delay_is_capped() {
        let config = fast();
        let next = config.next_delay(Duration::from_millis(2));
        assert_eq!(next, Duration::from_millis(2));
    }
}
