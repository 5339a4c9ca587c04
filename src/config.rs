//! Resolved run configuration.
//!
//! [`Config`] is built once by the caller and handed to
//! [`crate::orchestrator::run`]; nothing in the library reads the process
//! environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::catalog::MAX_PAGE_SIZE;
use crate::download::DEFAULT_CONCURRENCY;
use crate::http::DEFAULT_MAX_RETRIES;
use crate::http::constants::{
    CONNECT_TIMEOUT, DEFAULT_BASE_BACKOFF, DEFAULT_MAX_BACKOFF, DOWNLOAD_TIMEOUT, LIST_TIMEOUT,
};

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = MAX_PAGE_SIZE;

/// Errors raised while validating configuration. All are fatal before any
/// network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required value is missing or blank.
    #[error("missing required configuration value: {field}")]
    Missing {
        /// Name of the missing value.
        field: &'static str,
    },

    /// The API endpoint is not an absolute http(s) URL.
    #[error("invalid API endpoint '{value}': {reason}")]
    InvalidEndpoint {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates a missing-value error.
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self::Missing { field }
    }

    /// Creates an invalid-endpoint error.
    pub fn invalid_endpoint(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct Config {
    endpoint: Url,
    collection_id: String,
    access_token: String,
    output_dir: PathBuf,
    concurrency: usize,
    page_size: u32,
    max_retries: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    list_timeout: Duration,
    download_timeout: Duration,
    connect_timeout: Duration,
}

impl Config {
    /// Validates the required values and fills in defaults for the rest.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for a blank collection id or token and
    /// [`ConfigError::InvalidEndpoint`] if `endpoint` is not an http(s) URL.
    pub fn new(
        endpoint: &str,
        collection_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let endpoint = parse_endpoint(endpoint)?;
        let collection_id = required("collection_id", collection_id.into())?;
        let access_token = required("access_token", access_token.into())?;

        Ok(Self {
            endpoint,
            collection_id,
            access_token,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            concurrency: DEFAULT_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            list_timeout: LIST_TIMEOUT,
            download_timeout: DOWNLOAD_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
        })
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Sets the worker count, clamped to at least 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the page size, clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Sets the retry cap for transient failures.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff base and ceiling. The ceiling is raised to the base
    /// if it is smaller.
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max.max(base);
        self
    }

    /// Sets the per-page listing timeout.
    #[must_use]
    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    /// Sets the download idle timeout: the longest wait for response headers
    /// or for the next body chunk.
    #[must_use]
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Sets the TCP connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[must_use]
    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn base_backoff(&self) -> Duration {
        self.base_backoff
    }

    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    #[must_use]
    pub fn list_timeout(&self) -> Duration {
        self.list_timeout
    }

    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

fn required(field: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::missing(field));
    }
    Ok(trimmed.to_string())
}

fn parse_endpoint(value: &str) -> Result<Url, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::missing("endpoint"));
    }
    let url = Url::parse(value).map_err(|e| ConfigError::invalid_endpoint(value, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::invalid_endpoint(
                value,
                format!("unsupported scheme '{other}'"),
            ));
        }
    }
    if url.cannot_be_a_base() {
        return Err(ConfigError::invalid_endpoint(value, "URL cannot carry a path"));
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new("https://api.example.com/v5", "42", "token").unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = config();
        assert_eq!(config.endpoint().as_str(), "https://api.example.com/v5");
        assert_eq!(config.output_dir(), Path::new("downloads"));
        assert_eq!(config.concurrency(), 4);
        assert_eq!(config.page_size(), 50);
        assert_eq!(config.max_retries(), 5);
        assert_eq!(config.base_backoff(), Duration::from_secs(1));
        assert_eq!(config.max_backoff(), Duration::from_secs(60));
        assert_eq!(config.list_timeout(), Duration::from_secs(30));
        assert_eq!(config.download_timeout(), Duration::from_secs(60));
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_trims_required_values() {
        let config = Config::new(" https://api.example.com ", " 42 ", " tok ").unwrap();
        assert_eq!(config.collection_id(), "42");
        assert_eq!(config.access_token(), "tok");
    }

    #[test]
    fn test_config_missing_values() {
        assert!(matches!(
            Config::new("https://api.example.com", "42", "  "),
            Err(ConfigError::Missing { field: "access_token" })
        ));
        assert!(matches!(
            Config::new("https://api.example.com", "", "tok"),
            Err(ConfigError::Missing { field: "collection_id" })
        ));
        assert!(matches!(
            Config::new("", "42", "tok"),
            Err(ConfigError::Missing { field: "endpoint" })
        ));
    }

    #[test]
    fn test_config_invalid_endpoint() {
        for endpoint in ["not a url", "ftp://example.com", "mailto:a@example.com"] {
            let result = Config::new(endpoint, "42", "tok");
            assert!(
                matches!(result, Err(ConfigError::InvalidEndpoint { .. })),
                "endpoint: {endpoint}"
            );
        }
    }

    #[test]
    fn test_config_clamps_concurrency_and_page_size() {
        let config = config().with_concurrency(0).with_page_size(500);
        assert_eq!(config.concurrency(), 1);
        assert_eq!(config.page_size(), 50);

        let config = config.with_page_size(0).with_concurrency(16);
        assert_eq!(config.page_size(), 1);
        assert_eq!(config.concurrency(), 16);
    }

    #[test]
    fn test_config_backoff_ceiling_not_below_base() {
        let config = config().with_backoff(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(config.max_backoff(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::missing("access_token").to_string(),
            "missing required configuration value: access_token"
        );
        assert!(
            ConfigError::invalid_endpoint("x", "bad")
                .to_string()
                .contains("'x'")
        );
    }
}
