//! Constants for the HTTP layer (timeouts, backoff, excerpt sizes).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for one collection page request.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default idle timeout of an asset download: the longest wait for the
/// response headers or for the next body chunk.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Base unit of the exponential backoff: sleep = base * 2^attempt.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound of a single backoff sleep.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Maximum number of characters of an error body kept in [`super::RequestError`].
pub const BODY_EXCERPT_CHARS: usize = 200;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("collection-downloader/", env!("CARGO_PKG_VERSION"));
