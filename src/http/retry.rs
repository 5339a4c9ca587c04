//! Retry logic with exponential backoff for transient request failures.
//!
//! This module provides the [`RetryPolicy`], the [`FailureType`] classification
//! and the [`RequestExecutor`] that applies them around [`HttpClient`] calls.
//!
//! # Overview
//!
//! When a request fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - 500/502/503/504, timeouts, dropped connections
//! - [`FailureType::RateLimited`] - HTTP 429, retried exactly like transient failures
//! - [`FailureType::Permanent`] - everything else; never retried
//!
//! The [`RetryPolicy`] then decides whether another attempt is allowed and how
//! long to sleep first:
//!
//! ```text
//! delay = min(max_delay, base_delay * 2^retry)    retry = 1, 2, 3, ...
//! ```
//!
//! With the defaults (base 1s, cap 60s, 5 retries) the sleeps are 2s, 4s, 8s,
//! 16s, 32s. There is no jitter and no Retry-After negotiation.
//!
//! # Example
//!
//! ```
//! use collection_core::http::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! match policy.should_retry(FailureType::Transient, 0) {
//!     RetryDecision::Retry { delay, retry } => println!("retry {retry} in {delay:?}"),
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, info, instrument};

use super::client::{ApiRequest, HttpClient};
use super::constants::{DEFAULT_BASE_BACKOFF, DEFAULT_MAX_BACKOFF};
use super::error::RequestError;

/// Default maximum number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Classification of request failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,

    /// Server rate limiting (HTTP 429). Backs off like [`FailureType::Transient`].
    RateLimited,

    /// Failure that won't succeed regardless of retries.
    Permanent,
}

impl FailureType {
    /// Whether this failure type is eligible for another attempt.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited)
    }
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then make retry number `retry` (1-indexed).
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which retry this will be (first retry is 1).
        retry: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_retries`: 5
/// - `base_delay`: 1 second
/// - `max_delay`: 60 seconds
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    max_retries: u32,

    /// Unit multiplied by `2^retry`.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_BACKOFF,
            max_delay: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Creates a policy with a custom retry cap, using defaults for other settings.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Returns the configured retry cap.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decides whether to retry after a failure.
    ///
    /// `retries_done` is the number of retries already made (0 after the
    /// initial attempt fails).
    #[instrument(level = "trace", skip(self), fields(max_retries = self.max_retries))]
    pub fn should_retry(&self, failure_type: FailureType, retries_done: u32) -> RetryDecision {
        if !failure_type.is_retryable() {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if retries_done >= self.max_retries {
            debug!(retries_done, max = self.max_retries, "retry cap reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max retries ({}) exhausted", self.max_retries),
            };
        }

        let retry = retries_done + 1;
        RetryDecision::Retry {
            delay: self.delay_for(retry),
            retry,
        }
    }

    /// Backoff before retry number `retry`: `min(max_delay, base_delay * 2^retry)`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Errors that the executor knows how to classify and wrap.
pub trait Retryable: Sized {
    /// Classifies this error for the retry decision.
    fn failure_type(&self) -> FailureType;

    /// Converts the last transient error into the "retries exhausted" form.
    #[must_use]
    fn exhausted(self, url: &str, attempts: u32) -> Self;
}

impl Retryable for RequestError {
    fn failure_type(&self) -> FailureType {
        classify_error(self)
    }

    fn exhausted(self, url: &str, attempts: u32) -> Self {
        RequestError::retries_exhausted(url, attempts, self)
    }
}

/// Applies a [`RetryPolicy`] around requests issued through an [`HttpClient`].
///
/// Backoff sleeps happen on the calling task only, so a worker waiting out a
/// 429 never holds up its siblings.
#[derive(Debug)]
pub struct RequestExecutor {
    client: HttpClient,
    policy: RetryPolicy,
    retried: AtomicUsize,
}

impl RequestExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(client: HttpClient, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            retried: AtomicUsize::new(0),
        }
    }

    /// Returns the wrapped client.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Total number of backoff sleeps taken by this executor so far.
    #[must_use]
    pub fn retries(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Sends `request`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the permanent [`RequestError`] as-is, or
    /// [`RequestError::RetriesExhausted`] once the retry cap is hit.
    pub async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response, RequestError> {
        self.run(request.url().as_str(), || self.client.send(request))
            .await
    }

    /// Runs `operation` until it succeeds, fails permanently, or the retry cap
    /// is reached. Each call of `operation` is one attempt.
    ///
    /// # Errors
    ///
    /// Returns the operation's error; transient errors that outlive the retry
    /// cap are passed through [`Retryable::exhausted`].
    #[instrument(level = "debug", skip(self, operation))]
    pub async fn run<T, E, F, Fut>(&self, url: &str, mut operation: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retries_done = 0u32;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let failure_type = error.failure_type();
            match self.policy.should_retry(failure_type, retries_done) {
                RetryDecision::Retry { delay, retry } => {
                    info!(
                        url,
                        retry,
                        max_retries = self.policy.max_retries(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying request"
                    );
                    self.retried.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    retries_done = retry;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url, %reason, "not retrying request");
                    if failure_type.is_retryable() {
                        return Err(error.exhausted(url, retries_done + 1));
                    }
                    return Err(error);
                }
            }
        }
    }
}

/// Classifies a request error into a failure type for retry decisions.
///
/// # HTTP Status Code Classification
///
/// | Status | Type |
/// |--------|------|
/// | 429 | RateLimited |
/// | 500, 502, 503, 504 | Transient |
/// | any other non-2xx | Permanent |
///
/// # Non-HTTP Errors
///
/// | Error | Type |
/// |-------|------|
/// | Timeout | Transient |
/// | Network (most) | Transient |
/// | Network (TLS) | Permanent |
/// | Decode, InvalidUrl, RetriesExhausted | Permanent |
#[must_use]
pub fn classify_error(error: &RequestError) -> FailureType {
    match error {
        RequestError::HttpStatus { status, .. } => classify_http_status(*status),
        RequestError::Timeout { .. } => FailureType::Transient,
        RequestError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        RequestError::Decode { .. }
        | RequestError::InvalidUrl { .. }
        | RequestError::RetriesExhausted { .. } => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        429 => FailureType::RateLimited,
        500 | 502 | 503 | 504 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(10))
    }

    fn test_executor(max_retries: u32) -> RequestExecutor {
        RequestExecutor::new(HttpClient::new().unwrap(), fast_policy(max_retries))
    }

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 5);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_retry_policy_with_max_retries() {
        let policy = RetryPolicy::with_max_retries(2);
        assert_eq!(policy.max_retries(), 2);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_delay_doubles_from_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(5), Duration::from_secs(32));
    }

    #[test]
    fn test_delay_respects_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(6), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn test_should_retry_permanent_does_not_retry() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(FailureType::Permanent, 0);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
    }

    #[test]
    fn test_should_retry_rate_limited_retries() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(FailureType::RateLimited, 0);
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::from_secs(2),
                retry: 1
            }
        );
    }

    #[test]
    fn test_should_retry_respects_cap() {
        let policy = RetryPolicy::with_max_retries(2);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 0),
            RetryDecision::Retry { retry: 1, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry { retry: 2, .. }
        ));
        match policy.should_retry(FailureType::Transient, 2) {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("exhausted")),
            other => panic!("expected DoNotRetry, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_retries_never_retries() {
        let policy = RetryPolicy::with_max_retries(0);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 0),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_classify_transient_statuses() {
        for status in [500, 502, 503, 504] {
            let error = RequestError::http_status("http://example.com", status, "");
            assert_eq!(classify_error(&error), FailureType::Transient, "{status}");
        }
    }

    #[test]
    fn test_classify_429_rate_limited() {
        let error = RequestError::http_status("http://example.com", 429, "");
        assert_eq!(classify_error(&error), FailureType::RateLimited);
    }

    #[test]
    fn test_classify_other_statuses_permanent() {
        for status in [400, 401, 403, 404, 408, 410, 501, 505] {
            let error = RequestError::http_status("http://example.com", status, "");
            assert_eq!(classify_error(&error), FailureType::Permanent, "{status}");
        }
    }

    #[test]
    fn test_classify_timeout_transient() {
        let error = RequestError::timeout("http://example.com");
        assert_eq!(classify_error(&error), FailureType::Transient);
    }

    #[test]
    fn test_classify_exhausted_permanent() {
        let last = RequestError::timeout("http://example.com");
        let error = RequestError::retries_exhausted("http://example.com", 3, last);
        assert_eq!(classify_error(&error), FailureType::Permanent);
    }

    // ==================== Executor Tests ====================

    #[tokio::test]
    async fn test_run_returns_after_transient_failures() {
        let executor = test_executor(5);
        let calls = AtomicU32::new(0);
        let statuses = [429u16, 503, 502];

        let result: Result<&str, RequestError> = executor
            .run("http://example.com/x", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) as usize;
                async move {
                    match statuses.get(n) {
                        Some(status) => Err(RequestError::http_status("http://example.com/x", *status, "")),
                        None => Ok("done"),
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(executor.retries(), 3);
    }

    #[tokio::test]
    async fn test_run_exhausts_after_cap() {
        let executor = test_executor(5);
        let calls = AtomicU32::new(0);

        let result: Result<(), RequestError> = executor
            .run("http://example.com/x", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RequestError::http_status("http://example.com/x", 503, "busy")) }
            })
            .await;

        match result {
            Err(RequestError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 6),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(executor.retries(), 5);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_permanent() {
        let executor = test_executor(5);
        let calls = AtomicU32::new(0);

        let result: Result<(), RequestError> = executor
            .run("http://example.com/x", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RequestError::http_status("http://example.com/x", 404, "")) }
            })
            .await;

        assert!(matches!(
            result,
            Err(RequestError::HttpStatus { status: 404, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(executor.retries(), 0);
    }

    #[tokio::test]
    async fn test_run_treats_timeout_as_retry() {
        let executor = test_executor(1);
        let calls = AtomicU32::new(0);

        let result: Result<u8, RequestError> = executor
            .run("http://example.com/x", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(RequestError::timeout("http://example.com/x"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(executor.retries(), 1);
    }
}
