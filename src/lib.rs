//! Collection Downloader Core Library
//!
//! Lists every item of a remote collection through a bookmark-paginated API
//! and downloads the best image variant of each item into a local directory,
//! with bounded concurrency and exponential backoff on transient failures.
//!
//! # Architecture
//!
//! - [`http`] - HTTP client adapter, error taxonomy and retrying executor
//! - [`catalog`] - Item model, paginator and image variant selection
//! - [`download`] - Filename resolution and the download worker pool
//! - [`config`] - Resolved run configuration
//! - [`progress`] - Progress reporting seam
//! - [`orchestrator`] - Listing followed by downloading, end to end

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod download;
pub mod http;
pub mod orchestrator;
pub mod progress;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use catalog::{AssetReference, ItemDescriptor, Listing, Paginator, select_best};
pub use config::{Config, ConfigError};
pub use download::{
    DEFAULT_CONCURRENCY, DownloadPool, DownloadStats, DownloadSummary, FilenameResolver,
    JobOutcome, JobReport,
};
pub use http::{
    DEFAULT_MAX_RETRIES, FailureType, HttpClient, RequestError, RequestExecutor, RetryPolicy,
    classify_error,
};
pub use orchestrator::{RunError, RunSummary, run};
pub use progress::{LogProgress, ProgressSink};
