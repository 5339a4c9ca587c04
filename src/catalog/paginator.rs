//! Bookmark-based traversal of a remote collection.
//!
//! ```text
//! GET {endpoint}/collections/{id}/items?page_size=N[&bookmark=TOKEN]
//! -> { "items": [ {...}, ... ], "bookmark": "opaque" | null }
//! ```
//!
//! The walk stops as soon as a page comes back without a bookmark (or with an
//! empty one) or with no items at all. A fresh [`Paginator::list_all`] call
//! always starts again from the first page.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::item::ItemDescriptor;
use crate::http::constants::LIST_TIMEOUT;
use crate::http::{ApiRequest, RequestError, RequestExecutor};
use crate::progress::ProgressSink;

/// Largest page size the source accepts.
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    bookmark: Option<String>,
}

/// One decoded page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Items of this page, in source order.
    pub items: Vec<ItemDescriptor>,
    /// Number of entries the source returned, including non-object ones that
    /// were dropped from `items`.
    pub raw_count: usize,
    /// Continuation token, already normalised: empty tokens become `None`.
    pub bookmark: Option<String>,
}

/// Result of a full traversal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    /// All items, concatenated in page order.
    pub items: Vec<ItemDescriptor>,
    /// Number of pages requested.
    pub pages: usize,
}

/// Walks a collection page by page through a [`RequestExecutor`].
#[derive(Debug)]
pub struct Paginator<'a> {
    executor: &'a RequestExecutor,
    endpoint: Url,
    access_token: String,
    timeout: Duration,
}

impl<'a> Paginator<'a> {
    /// Creates a paginator for the API rooted at `endpoint`.
    #[must_use]
    pub fn new(executor: &'a RequestExecutor, endpoint: Url, access_token: impl Into<String>) -> Self {
        Self {
            executor,
            endpoint,
            access_token: access_token.into(),
            timeout: LIST_TIMEOUT,
        }
    }

    /// Overrides the per-page request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the URL of one page.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidUrl`] if the endpoint cannot carry a path.
    pub fn page_url(
        &self,
        collection_id: &str,
        page_size: u32,
        bookmark: Option<&str>,
    ) -> Result<Url, RequestError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| RequestError::invalid_url(self.endpoint.as_str()))?
            .pop_if_empty()
            .extend(["collections", collection_id, "items"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page_size", &page_size.to_string());
            if let Some(bookmark) = bookmark {
                query.append_pair("bookmark", bookmark);
            }
        }
        Ok(url)
    }

    /// Fetches and decodes one page, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestError`] left after retries.
    pub async fn fetch_page(
        &self,
        collection_id: &str,
        page_size: u32,
        bookmark: Option<&str>,
    ) -> Result<Page, RequestError> {
        let url = self.page_url(collection_id, page_size, bookmark)?;
        let request = ApiRequest::get(url, self.timeout).with_bearer(self.access_token.as_str());
        let url = request.url().as_str();

        let body: PageResponse = self
            .executor
            .run(url, || async {
                let response = self.executor.client().send(&request).await?;
                response
                    .json::<PageResponse>()
                    .await
                    .map_err(|e| RequestError::from_body(url, e))
            })
            .await?;

        let raw_count = body.items.len();
        let items: Vec<ItemDescriptor> = body
            .items
            .into_iter()
            .filter_map(ItemDescriptor::from_value)
            .collect();
        if items.len() != raw_count {
            warn!(
                dropped = raw_count - items.len(),
                "ignoring non-object entries in page"
            );
        }

        Ok(Page {
            items,
            raw_count,
            bookmark: body.bookmark.filter(|b| !b.is_empty()),
        })
    }

    /// Collects every item of the collection.
    ///
    /// `page_size` is clamped to `1..=MAX_PAGE_SIZE` before the first request.
    ///
    /// # Errors
    ///
    /// Any page failure aborts the traversal; no partial listing is returned.
    #[instrument(skip(self, progress), fields(endpoint = %self.endpoint))]
    pub async fn list_all(
        &self,
        collection_id: &str,
        page_size: u32,
        progress: &dyn ProgressSink,
    ) -> Result<Listing, RequestError> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut listing = Listing::default();
        let mut bookmark: Option<String> = None;

        loop {
            let page = self
                .fetch_page(collection_id, page_size, bookmark.as_deref())
                .await?;
            listing.pages += 1;
            let page_was_empty = page.raw_count == 0;
            listing.items.extend(page.items);
            progress.page_fetched(listing.pages, listing.items.len());
            debug!(
                page = listing.pages,
                items = listing.items.len(),
                has_bookmark = page.bookmark.is_some(),
                "fetched page"
            );

            match page.bookmark {
                Some(next) if !page_was_empty => bookmark = Some(next),
                _ => break,
            }
        }

        Ok(listing)
    }
}
