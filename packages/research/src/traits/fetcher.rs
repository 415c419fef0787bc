//! Page fetch strategy trait.
//!
//! Two strategies exist: a lightweight HTTP request and a full browser
//! render. `PageFetcher` picks between them with a heuristic predicate.

use async_trait::async_trait;
use url::Url;

use crate::error::FetchResult;
use crate::types::page::PageContent;

/// One way of retrieving a page.
///
/// # Implementations
///
/// - `HttpFetcher` - reqwest, fast, no JavaScript
/// - `BrowserFetcher` - headless Chromium (feature `browser`)
/// - `MockFetchStrategy` - For testing
#[async_trait]
pub trait PageFetchStrategy: Send + Sync {
    /// Fetch a single URL.
    ///
    /// Must fail with `FetchError::Blocked` on HTTP 403/429 and
    /// `FetchError::Timeout` when the request runs out of time.
    async fn fetch(&self, url: &Url) -> FetchResult<PageContent>;

    /// Strategy name (for logging).
    fn name(&self) -> &str {
        "unknown"
    }

    /// Release long-lived resources such as a browser process.
    async fn shutdown(&self) {}
}
