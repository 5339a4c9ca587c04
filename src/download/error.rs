//! Error type for a single download job.
//!
//! A [`DownloadError`] never leaves the worker pool: it is rendered into the
//! job's [`super::JobOutcome::Failed`] reason.

use std::path::PathBuf;

use thiserror::Error;

use crate::http::{FailureType, RequestError, Retryable, classify_error};

/// Errors that can occur while downloading one asset.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Request failed or the response body stream broke.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// File system error while writing the asset.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Retryable for DownloadError {
    fn failure_type(&self) -> FailureType {
        match self {
            Self::Request(error) => classify_error(error),
            // Disk full or permission denied will not fix itself between attempts.
            Self::Io { .. } => FailureType::Permanent,
        }
    }

    fn exhausted(self, url: &str, attempts: u32) -> Self {
        match self {
            Self::Request(error) => Self::Request(error.exhausted(url, attempts)),
            other @ Self::Io { .. } => other,
        }
    }
}
