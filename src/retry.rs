//! Retry logic with exponential backoff for rate-limited remote calls
//!
//! This module wraps media source calls with bounded retry. Only
//! rate-limiting failures are retried; an authentication demand or any
//! other failure surfaces immediately, because retrying cannot help.
//! Every attempt first passes through the shared [`RateGate`], so even
//! retries respect the process-wide request pacing.
//!
//! # Example
//!
//! ```no_run
//! use reel_dl::config::{FetchConfig, RetryConfig};
//! use reel_dl::error::SourceError;
//! use reel_dl::rate_gate::RateGate;
//! use reel_dl::retry::fetch_with_retry;
//!
//! # async fn example() -> Result<(), SourceError> {
//! let gate = RateGate::new();
//! let fetch = FetchConfig::default();
//! let retry = RetryConfig::default();
//!
//! let value = fetch_with_retry(&gate, &fetch, &retry, || async {
//!     Ok::<_, SourceError>("resolved")
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{FetchConfig, RetryConfig};
use crate::error::SourceError;
use crate::rate_gate::{RateGate, random_jitter};
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (the remote service throttling requests) should
/// return `true`. Permanent failures (missing accounts, private
/// profiles, authentication demands) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for SourceError {
    fn is_retryable(&self) -> bool {
        // Only throttling is transient. AuthRequired is deliberately not
        // retried: without a session change every retry would fail the
        // same way.
        matches!(self, SourceError::RateLimited)
    }
}

/// Execute a remote call with rate-gate pacing and bounded backoff retry
///
/// # Arguments
///
/// * `gate` - The process-wide pacing gate, acquired before every attempt
/// * `fetch` - Pacing configuration (gate interval and jitter bounds)
/// * `retry` - Backoff configuration (attempt budget, base delay,
///   multiplier, jitter bounds)
/// * `operation` - Async closure returning `Result<T, E>` where `E`
///   implements [`IsRetryable`]
///
/// # Returns
///
/// The successful result, or the last error once the retry budget is
/// exhausted or a non-retryable error occurs.
pub async fn fetch_with_retry<F, Fut, T, E>(
    gate: &RateGate,
    fetch: &FetchConfig,
    retry: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        gate.acquire(
            fetch.min_request_interval,
            fetch.gate_jitter_min,
            fetch.gate_jitter_max,
        )
        .await;

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "remote call succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let delay = backoff_delay(retry, attempt);
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_retries = retry.max_retries,
                    delay_ms = delay.as_millis(),
                    "remote call rate limited, backing off before retry"
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "remote call still rate limited after all retry attempts"
                    );
                } else {
                    tracing::error!(error = %e, "remote call failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Backoff delay for the given 0-based attempt number
///
/// `base_delay * multiplier^attempt` plus a uniform random jitter, so
/// the defaults produce roughly 30s, 90s, 270s.
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exponential = Duration::from_secs_f64(
        retry.base_delay.as_secs_f64() * retry.backoff_multiplier.powi(attempt as i32),
    );
    exponential + random_jitter(retry.jitter_min, retry.jitter_max)
}
