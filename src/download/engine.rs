//! Worker pool that downloads the best asset of every item concurrently.
//!
//! # Concurrency Model
//!
//! - Exactly `concurrency` Tokio tasks are spawned per [`DownloadPool::run`]
//! - Jobs travel over one FIFO channel whose receiver the workers share behind
//!   an async mutex; the lock is held only while dequeuing, never across a
//!   request, a backoff sleep or a disk write
//! - Closing the job channel is the stop signal: a worker that dequeues
//!   `None` moves to [`WorkerState::Stopped`] and exits
//! - Workers send one [`JobReport`] per job over a second channel to a single
//!   collector (the caller of `run`), which updates [`DownloadStats`] and the
//!   [`ProgressSink`], so progress output is never interleaved
//!
//! # Failure isolation
//!
//! Every job ends in exactly one [`JobOutcome`]. A permanent failure is
//! recorded as [`JobOutcome::Failed`] and the worker moves on to the next job.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use collection_core::download::DownloadPool;
//! use collection_core::http::{HttpClient, RequestExecutor, RetryPolicy};
//! use collection_core::progress::LogProgress;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Arc::new(RequestExecutor::new(HttpClient::new()?, RetryPolicy::default()));
//! let pool = DownloadPool::new(executor, "./downloads", 4);
//! let summary = pool.run(Vec::new(), &LogProgress).await;
//! println!("{} succeeded, {} skipped, {} failed", summary.succeeded, summary.skipped, summary.failed);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use super::error::DownloadError;
use super::filename::{FilenameResolver, partial_path};
use crate::catalog::{ItemDescriptor, select_best};
use crate::http::constants::DOWNLOAD_TIMEOUT;
use crate::http::{ApiRequest, RequestError, RequestExecutor};
use crate::progress::ProgressSink;

/// Default number of workers.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Write buffer size used when streaming an asset to disk (256 KiB).
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Reason recorded for items without any usable asset URL.
pub const NO_ASSET_REASON: &str = "no asset reference with a URL";

/// One unit of work: an item and its position in the run.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// Zero-based position of the item in the listing.
    pub sequence: usize,
    /// The item to download.
    pub item: ItemDescriptor,
}

/// Terminal outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The asset was written to `path`.
    Downloaded {
        /// Final destination path.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// The item had nothing to download.
    Skipped {
        /// Why the item was skipped.
        reason: String,
    },
    /// The download failed permanently.
    Failed {
        /// Rendered error.
        reason: String,
    },
}

/// A job outcome tagged with the item it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Identifier of the item.
    pub item_id: String,
    /// What happened.
    pub outcome: JobOutcome,
}

/// Lifecycle of a worker task, used in trace logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for the next job.
    Idle,
    /// Request in flight.
    Fetching,
    /// Streaming the response body to disk.
    Writing,
    /// Job channel closed; the worker has exited.
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Writing => "writing",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Counters of terminal job outcomes.
///
/// Uses atomic counters so a shared reference can be read while a run is in
/// progress.
#[derive(Debug, Default)]
pub struct DownloadStats {
    succeeded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of downloaded assets.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Returns the number of items skipped for lack of an asset.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Returns the number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of jobs that reached a terminal outcome.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.succeeded() + self.skipped() + self.failed()
    }

    /// Counts one outcome and returns the new processed total.
    fn record(&self, outcome: &JobOutcome) -> usize {
        let counter = match outcome {
            JobOutcome::Downloaded { .. } => &self.succeeded,
            JobOutcome::Skipped { .. } => &self.skipped,
            JobOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.processed()
    }
}

/// Result of one [`DownloadPool::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Number of jobs enqueued.
    pub enqueued: usize,
    /// Downloaded assets.
    pub succeeded: usize,
    /// Items without an asset.
    pub skipped: usize,
    /// Permanent failures.
    pub failed: usize,
    /// Reports of the failed jobs, in completion order.
    pub failures: Vec<JobReport>,
}

impl DownloadSummary {
    /// Returns `succeeded + skipped + failed`.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

/// Fixed-size pool of download workers.
#[derive(Debug, Clone)]
pub struct DownloadPool {
    executor: Arc<RequestExecutor>,
    resolver: Arc<FilenameResolver>,
    output_dir: PathBuf,
    concurrency: usize,
    idle_timeout: Duration,
}

impl DownloadPool {
    /// Creates a pool writing into `output_dir`.
    ///
    /// `concurrency` is clamped to at least 1.
    #[must_use]
    pub fn new(
        executor: Arc<RequestExecutor>,
        output_dir: impl Into<PathBuf>,
        concurrency: usize,
    ) -> Self {
        Self {
            executor,
            resolver: Arc::new(FilenameResolver::new()),
            output_dir: output_dir.into(),
            concurrency: concurrency.max(1),
            idle_timeout: DOWNLOAD_TIMEOUT,
        }
    }

    /// Overrides the idle timeout: the longest wait for the response headers
    /// or for the next body chunk. A slow transfer that keeps making progress
    /// is never cut off.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Returns the number of workers a run spawns.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads the best asset of every item and waits for all workers.
    ///
    /// Individual job failures never make this method fail; they are counted
    /// in the returned summary.
    #[instrument(skip(self, items, progress), fields(jobs = items.len(), concurrency = self.concurrency))]
    pub async fn run(&self, items: Vec<ItemDescriptor>, progress: &dyn ProgressSink) -> DownloadSummary {
        let enqueued = items.len();
        let (job_tx, job_rx) = mpsc::channel::<DownloadJob>(enqueued.max(1));
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (report_tx, mut report_rx) = mpsc::unbounded_channel::<JobReport>();

        progress.downloads_started(enqueued);

        let mut handles = Vec::with_capacity(self.concurrency);
        for worker_id in 0..self.concurrency {
            let worker = Worker {
                id: worker_id,
                pool: self.clone(),
            };
            handles.push(tokio::spawn(worker.run(
                Arc::clone(&job_rx),
                report_tx.clone(),
            )));
        }
        // Only workers hold report senders now; the collector ends when they all exit.
        drop(report_tx);

        for (sequence, item) in items.into_iter().enumerate() {
            if job_tx.send(DownloadJob { sequence, item }).await.is_err() {
                warn!(sequence, "all workers exited before the queue was filled");
                break;
            }
        }
        // Closing the queue tells every worker to stop once it is drained.
        drop(job_tx);

        let stats = DownloadStats::new();
        let mut failures = Vec::new();
        while let Some(report) = report_rx.recv().await {
            let done = stats.record(&report.outcome);
            progress.job_finished(&report, done, enqueued);
            if matches!(report.outcome, JobOutcome::Failed { .. }) {
                failures.push(report);
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "download worker panicked");
            }
        }

        let summary = DownloadSummary {
            enqueued,
            succeeded: stats.succeeded(),
            skipped: stats.skipped(),
            failed: stats.failed(),
            failures,
        };
        info!(
            enqueued,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            retries = self.executor.retries(),
            "download phase complete"
        );
        summary
    }
}

struct Worker {
    id: usize,
    pool: DownloadPool,
}

impl Worker {
    async fn run(
        self,
        jobs: Arc<Mutex<mpsc::Receiver<DownloadJob>>>,
        reports: mpsc::UnboundedSender<JobReport>,
    ) {
        loop {
            trace!(worker = self.id, state = %WorkerState::Idle);
            let next = { jobs.lock().await.recv().await };
            let Some(job) = next else {
                break;
            };

            let item_id = job.item.id();
            debug!(worker = self.id, sequence = job.sequence, %item_id, "dequeued job");
            let outcome = self.process(&job).await;
            if reports.send(JobReport { item_id, outcome }).is_err() {
                break;
            }
        }
        trace!(worker = self.id, state = %WorkerState::Stopped);
    }

    async fn process(&self, job: &DownloadJob) -> JobOutcome {
        let Some(asset) = select_best(&job.item) else {
            return JobOutcome::Skipped {
                reason: NO_ASSET_REASON.to_string(),
            };
        };

        let path = match self.resolve(job, &asset.url).await {
            Ok(path) => path,
            Err(reason) => return JobOutcome::Failed { reason },
        };

        match self.download(&asset.url, &path).await {
            Ok(bytes) => JobOutcome::Downloaded { path, bytes },
            Err(error) => {
                self.pool.resolver.release(&path);
                JobOutcome::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Claims a destination on the blocking pool; resolution checks the disk.
    async fn resolve(&self, job: &DownloadJob, url: &str) -> Result<PathBuf, String> {
        let resolver = Arc::clone(&self.pool.resolver);
        let output_dir = self.pool.output_dir.clone();
        let item = job.item.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || resolver.resolve(&output_dir, &item, &url))
            .await
            .map_err(|e| format!("filename resolution failed: {e}"))
    }

    /// Streams `url` into the partial file, retrying transient failures, then
    /// renames it onto `path`. A partial file this job created never outlives
    /// a failure; one it did not create is never touched.
    async fn download(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| RequestError::invalid_url(url))?;
        let request = ApiRequest::streaming(parsed);
        let part = partial_path(path);
        let created = AtomicBool::new(false);

        let result = self
            .pool
            .executor
            .run(url, || self.attempt(&request, &part, &created))
            .await;

        let finished = match result {
            Ok(bytes) => tokio::fs::rename(&part, path)
                .await
                .map(|()| bytes)
                .map_err(|e| DownloadError::io(path, e)),
            Err(error) => Err(error),
        };
        if finished.is_err() && created.load(Ordering::SeqCst) {
            debug!(path = %part.display(), "removing partial file after error");
            let _ = tokio::fs::remove_file(&part).await;
        }
        finished
    }

    async fn attempt(
        &self,
        request: &ApiRequest,
        part: &Path,
        created: &AtomicBool,
    ) -> Result<u64, DownloadError> {
        let url = request.url().as_str();
        let idle = self.pool.idle_timeout;
        trace!(worker = self.id, state = %WorkerState::Fetching, url);
        let response = tokio::time::timeout(idle, self.pool.executor.client().send(request))
            .await
            .map_err(|_| RequestError::timeout(url))??;

        trace!(worker = self.id, state = %WorkerState::Writing, path = %part.display());
        let file = open_partial(part, created)
            .await
            .map_err(|e| DownloadError::io(part, e))?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        loop {
            let next = tokio::time::timeout(idle, stream.next())
                .await
                .map_err(|_| RequestError::timeout(url))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| RequestError::from_reqwest(url, e))?;
            if chunk.is_empty() {
                continue;
            }
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(part, e))?;
            bytes_written += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(part, e))?;

        Ok(bytes_written)
    }
}

/// Opens the partial file. The first attempt requires the file to be new, so
/// a file this job did not create is never truncated; retries rewrite it.
async fn open_partial(part: &Path, created: &AtomicBool) -> std::io::Result<File> {
    if created.load(Ordering::SeqCst) {
        return File::create(part).await;
    }
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(part)
        .await?;
    created.store(true, Ordering::SeqCst);
    Ok(file)
}
