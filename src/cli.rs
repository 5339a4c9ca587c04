//! CLI argument definitions using clap derive macros.
//!
//! Every run setting can also come from the environment (or a `.env` file in
//! the working directory); command-line flags take precedence.

use std::path::PathBuf;

use clap::Parser;

use collection_core::config::{DEFAULT_OUTPUT_DIR, DEFAULT_PAGE_SIZE};
use collection_core::{DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES};

/// Download every image of a remote collection.
///
/// Lists the collection page by page, picks the best image variant of each
/// item and downloads them concurrently into the output directory.
#[derive(Parser, Debug)]
#[command(name = "collection-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Base URL of the collection API
    #[arg(long, env = "API_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Identifier of the collection to download
    #[arg(long, env = "COLLECTION_ID")]
    pub collection_id: Option<String>,

    /// Bearer token sent with listing requests
    #[arg(long, env = "API_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Directory downloads are written to (created if missing)
    #[arg(short = 'o', long, env = "OUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Number of concurrent download workers
    #[arg(short = 'c', long, env = "CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Items requested per page (clamped to 1-50)
    #[arg(long, env = "PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Maximum retries for transient failures (0-10)
    #[arg(short = 'r', long, env = "MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: u32,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Log filter used when `RUST_LOG` is unset.
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
