//! End-to-end run: list the collection, then download every item.
//!
//! ```text
//! Config ─► create output dir ─► Paginator::list_all ─► DownloadPool::run ─► RunSummary
//! ```
//!
//! Listing and downloading are strictly sequential: no download starts before
//! the last page has been fetched. A listing failure aborts the run before
//! any file is written; download failures are only counted.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::catalog::Paginator;
use crate::config::Config;
use crate::download::{DownloadPool, DownloadSummary};
use crate::http::{HttpClient, RequestError, RequestExecutor, RetryPolicy};
use crate::progress::ProgressSink;

/// Fatal run errors. Per-item download failures are not errors; they are
/// counted in [`DownloadSummary`].
#[derive(Debug, Error)]
pub enum RunError {
    /// The collection could not be listed completely.
    #[error("failed to list collection: {0}")]
    Listing(#[source] RequestError),

    /// The output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// Directory that was requested.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be built.
    #[error("failed to initialise HTTP client: {0}")]
    Client(#[source] RequestError),
}

/// Totals of one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages fetched while listing.
    pub pages: usize,
    /// Items found in the collection.
    pub items: usize,
    /// Download phase totals; all zero for an empty collection.
    pub downloads: DownloadSummary,
    /// Retries performed across listing and downloading.
    pub retries: usize,
}

/// Lists `config`'s collection and downloads the best asset of every item.
///
/// # Errors
///
/// - [`RunError::OutputDir`] if the output directory cannot be created
/// - [`RunError::Client`] if the HTTP client cannot be built
/// - [`RunError::Listing`] if any page fails after retries
#[instrument(skip(config, progress), fields(collection_id = %config.collection_id(), output_dir = %config.output_dir().display()))]
pub async fn run(config: &Config, progress: Arc<dyn ProgressSink>) -> Result<RunSummary, RunError> {
    let output_dir = config.output_dir();
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| RunError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let client = HttpClient::with_connect_timeout(config.connect_timeout()).map_err(RunError::Client)?;
    let policy = RetryPolicy::new(
        config.max_retries(),
        config.base_backoff(),
        config.max_backoff(),
    );
    let executor = Arc::new(RequestExecutor::new(client, policy));

    let listing = Paginator::new(&executor, config.endpoint().clone(), config.access_token())
        .with_timeout(config.list_timeout())
        .list_all(config.collection_id(), config.page_size(), progress.as_ref())
        .await
        .map_err(RunError::Listing)?;
    progress.listing_complete(listing.items.len(), listing.pages);

    let mut summary = RunSummary {
        pages: listing.pages,
        items: listing.items.len(),
        ..RunSummary::default()
    };

    if listing.items.is_empty() {
        progress.nothing_to_do();
    } else {
        let pool = DownloadPool::new(Arc::clone(&executor), output_dir, config.concurrency())
            .with_idle_timeout(config.download_timeout());
        summary.downloads = pool.run(listing.items, progress.as_ref()).await;
    }
    summary.retries = executor.retries();

    info!(
        pages = summary.pages,
        items = summary.items,
        succeeded = summary.downloads.succeeded,
        failed = summary.downloads.failed,
        retries = summary.retries,
        "run finished"
    );
    progress.run_finished(&summary);
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_run_error_listing_message() {
        let error = RunError::Listing(RequestError::http_status("https://api/x", 401, "nope"));
        assert!(error.to_string().starts_with("failed to list collection"));
    }

    #[tokio::test]
    async fn test_run_fails_when_output_dir_is_a_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let config = Config::new("http://127.0.0.1:9", "42", "tok")
            .unwrap()
            .with_output_dir(blocker.join("out"));
        let result = run(&config, Arc::new(crate::progress::LogProgress)).await;

        assert!(matches!(result, Err(RunError::OutputDir { .. })));
    }
}
