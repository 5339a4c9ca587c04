//! Terminal progress UI for interactive runs.

use std::sync::OnceLock;
use std::time::Duration;

use collection_core::{JobOutcome, JobReport, ProgressSink, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] {msg}";

/// [`ProgressSink`] that shows a spinner while listing and a bar of finished
/// jobs while downloading.
pub(crate) struct BarProgress {
    spinner: ProgressBar,
    bar: OnceLock<ProgressBar>,
}

impl BarProgress {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Listing collection...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self {
            spinner,
            bar: OnceLock::new(),
        }
    }
}

impl ProgressSink for BarProgress {
    fn page_fetched(&self, page: usize, items_so_far: usize) {
        self.spinner
            .set_message(format!("Listing collection: page {page}, {items_so_far} items"));
    }

    fn listing_complete(&self, total_items: usize, pages: usize) {
        self.spinner.finish_and_clear();
        eprintln!("Found {total_items} items in {pages} page(s)");
    }

    fn nothing_to_do(&self) {
        eprintln!("Nothing to download. Check the collection id, access token and its scopes.");
    }

    fn downloads_started(&self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let _ = self.bar.set(bar);
    }

    fn job_finished(&self, report: &JobReport, done: usize, _total: usize) {
        let Some(bar) = self.bar.get() else {
            return;
        };
        if let JobOutcome::Failed { reason } = &report.outcome {
            bar.println(format!("failed {}: {reason}", report.item_id));
        }
        bar.set_position(done as u64);
    }

    fn run_finished(&self, summary: &RunSummary) {
        if let Some(bar) = self.bar.get() {
            bar.finish_and_clear();
        }
        self.spinner.finish_and_clear();
        let downloads = &summary.downloads;
        println!(
            "Done: {} downloaded, {} skipped, {} failed ({} total)",
            downloads.succeeded,
            downloads.skipped,
            downloads.failed,
            downloads.total()
        );
    }
}
