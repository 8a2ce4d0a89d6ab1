//! Exponential backoff retry shared by the language model and search capabilities.
//!
//! Every attempt carries its own timeout; an expired attempt is treated exactly
//! like any other transient failure.

use crate::config::RetryConfig;
use crate::error::{LlmError, SearchError};
use std::future::Future;
use std::time::Duration;

/// Errors that can tell a transient failure from a permanent one.
pub trait RetryableError: std::fmt::Display {
    fn is_transient(&self) -> bool;

    /// Server-suggested delay, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// The error produced when an attempt exceeds its timeout.
    fn timed_out(after: Duration) -> Self;
}

impl RetryableError for LlmError {
    fn is_transient(&self) -> bool {
        LlmError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after_secs } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }

    fn timed_out(after: Duration) -> Self {
        LlmError::Timeout {
            timeout_secs: after.as_secs(),
        }
    }
}

impl RetryableError for SearchError {
    fn is_transient(&self) -> bool {
        SearchError::is_transient(self)
    }

    fn timed_out(after: Duration) -> Self {
        SearchError::Timeout {
            timeout_secs: after.as_secs(),
        }
    }
}

/// Result of a retried operation together with the number of attempts made.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// Permanent errors return immediately. At most `max_retries + 1` attempts are made.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    attempt_timeout: Duration,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    retry_counted(config, attempt_timeout, operation).await.result
}

/// Like [`with_retry`], but also reports how many attempts were made.
pub async fn retry_counted<F, Fut, T, E>(
    config: &RetryConfig,
    attempt_timeout: Duration,
    operation: F,
) -> RetryOutcome<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let mut attempt = 0u32;
    loop {
        let result = match tokio::time::timeout(attempt_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(E::timed_out(attempt_timeout)),
        };

        match result {
            Ok(val) => {
                return RetryOutcome {
                    result: Ok(val),
                    attempts: attempt + 1,
                };
            }
            Err(e) => {
                if !e.is_transient() || attempt >= config.max_retries {
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt + 1,
                    };
                }

                let backoff_ms = compute_backoff(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// Compute backoff delay, respecting a server-provided retry-after.
fn compute_backoff<E: RetryableError>(config: &RetryConfig, attempt: u32, err: &E) -> u64 {
    let computed = compute_exponential_backoff(config, attempt);
    match err.retry_after() {
        Some(server) => (server.as_millis() as u64).max(computed),
        None => computed,
    }
}

/// Pure exponential backoff with optional jitter.
fn compute_exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        let jitter = (capped as f64 * 0.25 * rand_simple()) as u64;
        capped + jitter
    } else {
        capped
    }
}

/// Cheap pseudo-random fraction in [0, 1) taken from the clock.
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
