//! Bounded exponential-backoff retry around a single async operation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry limits and backoff shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryOptions {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Outcome of [`execute_with_retry`].
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The final attempt's result.
    pub outcome: Result<T, E>,
    /// Attempts made, including the first.
    pub attempts: u32,
}

impl<T, E> RetryResult<T, E> {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    #[must_use]
    pub fn result(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    #[must_use]
    pub fn error(&self) -> Option<&E> {
        self.outcome.as_ref().err()
    }

    /// Drops the attempt count.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error if every attempt failed.
    pub fn into_result(self) -> Result<T, E> {
        self.outcome
    }
}

/// Delay before retry number `attempt + 1`: `base * multiplier^attempt`,
/// capped at `max_delay`.
#[must_use]
pub fn backoff_delay(options: &RetryOptions, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = options.base_delay.as_secs_f64() * options.backoff_multiplier.powi(exponent);
    let capped = secs.min(options.max_delay.as_secs_f64()).max(0.0);
    Duration::from_secs_f64(capped)
}

/// Runs `f` up to `max_retries + 1` times, sleeping with exponential
/// backoff between failed attempts. Never fails itself; the returned
/// [`RetryResult`] carries the last outcome.
pub async fn execute_with_retry<T, E, F, Fut>(
    f: F,
    options: &RetryOptions,
    context: &str,
) -> RetryResult<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    execute_with_retry_if(f, options, context, |_| true).await
}

/// Like [`execute_with_retry`], but stops early when `should_retry`
/// returns `false` for an error.
pub async fn execute_with_retry_if<T, E, F, Fut, P>(
    mut f: F,
    options: &RetryOptions,
    context: &str,
    should_retry: P,
) -> RetryResult<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        let outcome = f().await;
        let attempts = attempt + 1;

        match outcome {
            Ok(value) => {
                if attempt > 0 {
                    log::info!("{context}: succeeded on attempt {attempts}");
                }
                return RetryResult {
                    outcome: Ok(value),
                    attempts,
                };
            }
            Err(e) if attempt < options.max_retries && should_retry(&e) => {
                let delay = backoff_delay(options, attempt);
                log::warn!(
                    "{context}: attempt {attempts}/{} failed: {e}; retrying in {delay:?}",
                    options.max_retries.saturating_add(1)
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                log::error!("{context}: giving up after {attempts} attempt(s): {e}");
                return RetryResult {
                    outcome: Err(e),
                    attempts,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast() -> RetryOptions {
        RetryOptions {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let options = RetryOptions::default();
        assert_eq!(backoff_delay(&options, 0), Duration::from_secs(1));
        assert_eq!(backoff_delay(&options, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(&options, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(&options, 10), Duration::from_secs(30));
        assert_eq!(backoff_delay(&options, u32::MAX), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let result = execute_with_retry(
            || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("flaky")
                } else {
                    Ok("data")
                }
            },
            &fast(),
            "unit 42",
        )
        .await;

        assert!(result.success());
        assert_eq!(result.result(), Some(&"data"));
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = &AtomicU32::new(0);
        let result: RetryResult<(), String> = execute_with_retry(
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("failure {n}"))
            },
            &fast(),
            "unit 42",
        )
        .await;

        assert!(!result.success());
        assert_eq!(result.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.error().map(String::as_str), Some("failure 3"));
    }

    #[tokio::test]
    async fn permanent_errors_stop_early() {
        let calls = &AtomicU32::new(0);
        let result: RetryResult<(), &str> = execute_with_retry_if(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("not found")
            },
            &fast(),
            "unit 42",
            |e| *e != "not found",
        )
        .await;

        assert_eq!(result.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.into_result(), Err("not found"));
    }

    #[tokio::test]
    async fn zero_retries_runs_once() {
        let options = RetryOptions {
            max_retries: 0,
            ..fast()
        };
        let result: RetryResult<(), &str> =
            execute_with_retry(|| async { Err("boom") }, &options, "summary").await;
        assert_eq!(result.attempts, 1);
    }
}
