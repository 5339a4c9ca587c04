//! Progress reporting seam.
//!
//! The core never prints. It reports milestones to a [`ProgressSink`]; the
//! binary plugs in a terminal progress bar, tests and library users can use
//! [`LogProgress`] or their own implementation.
//!
//! Download-phase callbacks come from a single collector task, never from the
//! workers directly, so implementations see one call at a time in practice.

use tracing::{info, warn};

use crate::download::{JobOutcome, JobReport};
use crate::orchestrator::RunSummary;

/// Receiver of human-readable run milestones.
///
/// Every method has a no-op default.
pub trait ProgressSink: Send + Sync {
    /// A collection page was fetched; `items_so_far` counts all pages so far.
    fn page_fetched(&self, _page: usize, _items_so_far: usize) {}

    /// Pagination finished.
    fn listing_complete(&self, _total_items: usize, _pages: usize) {}

    /// The collection is empty; no download phase will run.
    fn nothing_to_do(&self) {}

    /// The worker pool is about to process `total` jobs.
    fn downloads_started(&self, _total: usize) {}

    /// One job reached a terminal outcome. `done` counts finished jobs.
    fn job_finished(&self, _report: &JobReport, _done: usize, _total: usize) {}

    /// The run completed.
    fn run_finished(&self, _summary: &RunSummary) {}
}

/// [`ProgressSink`] that writes every milestone to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn page_fetched(&self, page: usize, items_so_far: usize) {
        info!(page, items_so_far, "fetched collection page");
    }

    fn listing_complete(&self, total_items: usize, pages: usize) {
        info!(total_items, pages, "collection listing complete");
    }

    fn nothing_to_do(&self) {
        info!("collection has no items; nothing to do (check collection id, token and scopes)");
    }

    fn downloads_started(&self, total: usize) {
        info!(total, "starting downloads");
    }

    fn job_finished(&self, report: &JobReport, done: usize, total: usize) {
        match &report.outcome {
            JobOutcome::Downloaded { path, bytes } => {
                info!(done, total, item_id = %report.item_id, path = %path.display(), bytes, "downloaded");
            }
            JobOutcome::Skipped { reason } => {
                info!(done, total, item_id = %report.item_id, %reason, "skipped");
            }
            JobOutcome::Failed { reason } => {
                warn!(done, total, item_id = %report.item_id, %reason, "failed");
            }
        }
    }

    fn run_finished(&self, summary: &RunSummary) {
        info!(
            pages = summary.pages,
            total = summary.downloads.total(),
            succeeded = summary.downloads.succeeded,
            skipped = summary.downloads.skipped,
            failed = summary.downloads.failed,
            "run complete"
        );
    }
}
