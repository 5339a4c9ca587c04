//! HTTP client adapter.
//!
//! [`HttpClient`] performs exactly one GET per call. Status handling is limited
//! to turning non-2xx responses into [`RequestError::HttpStatus`] with a short
//! body excerpt; retry decisions belong to [`super::RequestExecutor`].

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{BODY_EXCERPT_CHARS, CONNECT_TIMEOUT, USER_AGENT};
use super::error::RequestError;

/// A prepared GET request.
///
/// Carries everything needed to re-issue the same request on every retry
/// attempt.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    url: Url,
    bearer_token: Option<String>,
    timeout: Option<Duration>,
}

impl ApiRequest {
    /// Creates a request for `url` with the given total timeout.
    #[must_use]
    pub fn get(url: Url, timeout: Duration) -> Self {
        Self {
            url,
            bearer_token: None,
            timeout: Some(timeout),
        }
    }

    /// Creates a request without a total timeout, for bodies that are
    /// streamed. The caller bounds the gap between chunks instead.
    #[must_use]
    pub fn streaming(url: Url) -> Self {
        Self {
            url,
            bearer_token: None,
            timeout: None,
        }
    }

    /// Attaches an `Authorization: Bearer <token>` header.
    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Returns the target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the total timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// HTTP client used for both page listing and asset downloads.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Network`] if the underlying client cannot be built
    /// (for example when no TLS backend is available).
    pub fn new() -> Result<Self, RequestError> {
        Self::with_connect_timeout(CONNECT_TIMEOUT)
    }

    /// Creates a client with an explicit connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Network`] if the underlying client cannot be built.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, RequestError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RequestError::network("<client builder>", e))?;
        Ok(Self { client })
    }

    /// Sends a GET request and returns the successful response with its body
    /// still unread, so callers may decode it or stream it.
    ///
    /// # Errors
    ///
    /// - [`RequestError::InvalidUrl`] for non-HTTP(S) URLs
    /// - [`RequestError::Timeout`] / [`RequestError::Network`] on transport failure
    /// - [`RequestError::HttpStatus`] for any non-2xx status
    #[instrument(level = "debug", skip(self, request), fields(url = %request.url))]
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, RequestError> {
        let url = request.url.as_str();
        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(RequestError::invalid_url(url));
        }

        let mut builder = self.client.get(request.url.clone());
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let excerpt = body_excerpt(response).await;
            debug!(status = status.as_u16(), "request returned error status");
            return Err(RequestError::http_status(url, status.as_u16(), excerpt));
        }

        Ok(response)
    }
}

/// Reads at most enough of an error body to fill the excerpt.
///
/// Body read failures only cost the excerpt.
async fn body_excerpt(mut response: reqwest::Response) -> String {
    let max_bytes = BODY_EXCERPT_CHARS * 4;
    let mut bytes = Vec::new();
    while bytes.len() < max_bytes {
        match response.chunk().await {
            Ok(Some(chunk)) => bytes.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&bytes)
        .chars()
        .take(BODY_EXCERPT_CHARS)
        .collect()
}
