//! CLI entry point for the collection downloader.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use collection_core::{Config, LogProgress, ProgressSink};
use tracing::{debug, info};

mod cli;
mod progress_bar;

use cli::Args;
use progress_bar::BarProgress;

#[tokio::main]
async fn main() -> Result<()> {
    // Values from .env behave like exported environment variables; real ones win.
    dotenvy::dotenv().ok();

    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = build_config(&args)?;
    info!(
        endpoint = %config.endpoint(),
        collection_id = config.collection_id(),
        output_dir = %config.output_dir().display(),
        concurrency = config.concurrency(),
        "Collection downloader starting"
    );

    let progress: Arc<dyn ProgressSink> = if !args.quiet && io::stderr().is_terminal() {
        Arc::new(BarProgress::new())
    } else {
        Arc::new(LogProgress)
    };

    collection_core::run(&config, progress).await?;
    Ok(())
}

fn build_config(args: &Args) -> Result<Config> {
    let endpoint = args
        .endpoint
        .as_deref()
        .context("API endpoint not set (use --endpoint or API_ENDPOINT)")?;
    let collection_id = args
        .collection_id
        .as_deref()
        .context("collection id not set (use --collection-id or COLLECTION_ID)")?;
    let access_token = args
        .access_token
        .as_deref()
        .context("access token not set (use --access-token or API_ACCESS_TOKEN)")?;

    let config = Config::new(endpoint, collection_id, access_token)?
        .with_output_dir(args.output_dir.clone())
        .with_concurrency(args.concurrency)
        .with_page_size(args.page_size)
        .with_max_retries(args.max_retries);
    Ok(config)
}
