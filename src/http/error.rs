//! Error types for the HTTP layer.
//!
//! Every variant carries the URL it concerns so that a failure surfaced from a
//! worker or from the lister can be reported without further context.

use thiserror::Error;

/// Errors that can occur while issuing a request or reading its body.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request or body read timed out.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx response.
    #[error("HTTP {status} requesting {url}: {body_excerpt}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Leading part of the response body, for diagnostics.
        body_excerpt: String,
    },

    /// The response body could not be decoded as the expected JSON shape.
    #[error("invalid response body from {url}: {source}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    /// The URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// A transient failure persisted past the retry cap.
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// The URL that kept failing.
        url: String,
        /// Total attempts made, including the first one.
        attempts: u32,
        /// The last transient error observed.
        #[source]
        last: Box<RequestError>,
    },
}

impl RequestError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error with a body excerpt.
    pub fn http_status(url: impl Into<String>, status: u16, body_excerpt: impl Into<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            body_excerpt: body_excerpt.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Wraps the last transient error once retries are used up.
    pub fn retries_exhausted(url: impl Into<String>, attempts: u32, last: RequestError) -> Self {
        Self::RetriesExhausted {
            url: url.into(),
            attempts,
            last: Box::new(last),
        }
    }

    /// Maps a reqwest error to `Timeout` or `Network`.
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Maps an error raised while reading a response body.
    pub(crate) fn from_body(url: &str, source: reqwest::Error) -> Self {
        if source.is_decode() {
            Self::decode(url, source)
        } else {
            Self::from_reqwest(url, source)
        }
    }

    /// Returns the HTTP status carried by this error, looking through
    /// [`RequestError::RetriesExhausted`].
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

// No `From<reqwest::Error>`: every variant needs the URL, which the source
// error does not reliably carry. Use the constructors above.
