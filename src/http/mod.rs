//! HTTP plumbing shared by the collection lister and the asset downloader.
//!
//! - [`HttpClient`] issues single GET requests with a per-request timeout and
//!   turns non-2xx responses into [`RequestError::HttpStatus`]. It never retries.
//! - [`RequestExecutor`] wraps the client with exponential backoff on
//!   transient failures, driven by a [`RetryPolicy`].

mod client;
pub(crate) mod constants;
mod error;
mod retry;

pub use client::{ApiRequest, HttpClient};
pub use error::RequestError;
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RequestExecutor, RetryDecision, RetryPolicy, Retryable,
    classify_error,
};

// Note: as in the rest of the crate we do NOT define module-local Result aliases.
// Use `Result<T, RequestError>` explicitly in function signatures.
