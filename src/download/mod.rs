//! Concurrent asset downloading.
//!
//! - [`FilenameResolver`] derives sanitized, collision-free destination paths
//! - [`DownloadPool`] runs a fixed number of workers over a FIFO job queue and
//!   reports one [`JobOutcome`] per item
//!
//! Transient request failures are retried through the shared
//! [`crate::http::RequestExecutor`]; a download that still fails is counted
//! and the run moves on.

mod engine;
mod error;
mod filename;

pub use engine::{
    CHUNK_SIZE, DEFAULT_CONCURRENCY, DownloadJob, DownloadPool, DownloadStats, DownloadSummary,
    JobOutcome, JobReport, NO_ASSET_REASON, WorkerState,
};
pub use error::DownloadError;
pub use filename::{
    DEFAULT_EXTENSION, FilenameResolver, MAX_BASE_NAME_CHARS, base_name, extension_from_url,
    partial_path, sanitize_filename,
};
