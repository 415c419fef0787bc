//! Page fetching: HTTP first, browser rendering when needed.
//!
//! [`PageFetcher`] composes the strategies. A URL on a known dynamic domain
//! goes straight to the browser; anything else is fetched over HTTP and
//! re-rendered in the browser when the response turns out thin.

#[cfg(feature = "browser")]
pub mod browser;
pub mod heuristic;
pub mod http;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use heuristic::RenderHeuristic;
pub use http::HttpFetcher;

use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ConfigError, FetchResult};
use crate::extract::visible_text_len;
use crate::limits::{retry, RetryConfig};
use crate::traits::fetcher::PageFetchStrategy;
use crate::types::config::ResearchConfig;
use crate::types::page::PageContent;

/// Strategy-selecting page fetcher.
///
/// # Example
///
/// ```rust,ignore
/// let fetcher = PageFetcher::from_config(&config)?;
/// let page = fetcher.fetch(&url).await?;
/// fetcher.shutdown().await;
/// ```
pub struct PageFetcher {
    http: Arc<dyn PageFetchStrategy>,
    browser: Option<Arc<dyn PageFetchStrategy>>,
    heuristic: RenderHeuristic,
    retry: RetryConfig,
}

impl PageFetcher {
    /// HTTP-only fetcher with default heuristic and retry policy.
    pub fn new(http: Arc<dyn PageFetchStrategy>) -> Self {
        let defaults = ResearchConfig::default();
        Self {
            http,
            browser: None,
            heuristic: RenderHeuristic::from_config(&defaults),
            retry: defaults.fetch_retry,
        }
    }

    /// Build the real strategies from configuration.
    ///
    /// The browser strategy is only available with the `browser` feature.
    pub fn from_config(config: &ResearchConfig) -> Result<Self, ConfigError> {
        let http = Arc::new(HttpFetcher::from_config(config)?);
        #[allow(unused_mut)]
        let mut fetcher = Self::new(http)
            .with_heuristic(RenderHeuristic::from_config(config))
            .with_retry(config.fetch_retry.clone());

        #[cfg(feature = "browser")]
        if config.browser_fallback_enabled {
            fetcher = fetcher.with_browser(Arc::new(BrowserFetcher::from_config(config)));
        }

        #[cfg(not(feature = "browser"))]
        if config.browser_fallback_enabled {
            debug!("Browser fallback requested but the browser feature is disabled");
        }

        Ok(fetcher)
    }

    pub fn with_browser(mut self, browser: Arc<dyn PageFetchStrategy>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn with_heuristic(mut self, heuristic: RenderHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    /// Fetch a page with bounded retries and browser fallback.
    ///
    /// Blocked responses (403/429) and other content-unavailable failures
    /// are returned immediately.
    pub async fn fetch(&self, url: &Url) -> FetchResult<PageContent> {
        if let Some(browser) = &self.browser {
            if self.heuristic.is_dynamic(url) {
                debug!(url = %url, "Dynamic domain, rendering in browser");
                match self.fetch_with(browser.as_ref(), url).await {
                    Ok(page) => return Ok(page),
                    Err(e) => {
                        warn!(url = %url, error = %e, "Browser render failed, trying HTTP");
                    }
                }
            }
        }

        let page = self.fetch_with(self.http.as_ref(), url).await?;

        let Some(browser) = &self.browser else {
            return Ok(page);
        };
        if !self.heuristic.is_thin(&page) {
            return Ok(page);
        }

        info!(url = %url, "Thin HTTP response, rendering in browser");
        match self.fetch_with(browser.as_ref(), url).await {
            Ok(rendered) if visible_text_len(&rendered) > visible_text_len(&page) => Ok(rendered),
            Ok(_) => {
                debug!(url = %url, "Browser render no richer than HTTP, keeping HTTP page");
                Ok(page)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Browser render failed, keeping HTTP page");
                Ok(page)
            }
        }
    }

    async fn fetch_with(&self, strategy: &dyn PageFetchStrategy, url: &Url) -> FetchResult<PageContent> {
        let operation = format!("fetch:{}", strategy.name());
        retry(&self.retry, &operation, |attempt| {
            debug!(url = %url, strategy = strategy.name(), attempt, "Fetching");
            strategy.fetch(url)
        })
        .await
    }

    /// Release browser resources.
    pub async fn shutdown(&self) {
        self.http.shutdown().await;
        if let Some(browser) = &self.browser {
            browser.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::testing::MockFetchStrategy;
    use std::time::Duration;

    const RICH: &str = "<html><body><p>Plenty of readable article text lives on this page, more than enough for the threshold.</p></body></html>";
    const THIN: &str = "<html><body><div id=\"app\"></div></body></html>";

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    fn heuristic() -> RenderHeuristic {
        RenderHeuristic::new(40, vec!["x.com".into()])
    }

    #[tokio::test]
    async fn test_http_only() {
        let http = Arc::new(MockFetchStrategy::new().with_page("https://a.com/", RICH));
        let fetcher = PageFetcher::new(http.clone()).with_retry(fast_retry());

        let page = fetcher.fetch(&url("https://a.com/")).await.unwrap();
        assert_eq!(page.body(), RICH);
        assert_eq!(http.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_thin_page_falls_back_to_browser() {
        let http = Arc::new(MockFetchStrategy::new().with_page("https://a.com/", THIN));
        let browser = Arc::new(MockFetchStrategy::new().with_page("https://a.com/", RICH));
        let fetcher = PageFetcher::new(http)
            .with_browser(browser.clone())
            .with_heuristic(heuristic())
            .with_retry(fast_retry());

        let page = fetcher.fetch(&url("https://a.com/")).await.unwrap();
        assert_eq!(page.body(), RICH);
        assert_eq!(browser.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_browser_failure_keeps_http_page() {
        let http = Arc::new(MockFetchStrategy::new().with_page("https://a.com/", THIN));
        let browser = Arc::new(MockFetchStrategy::new());
        let fetcher = PageFetcher::new(http)
            .with_browser(browser)
            .with_heuristic(heuristic())
            .with_retry(fast_retry());

        let page = fetcher.fetch(&url("https://a.com/")).await.unwrap();
        assert_eq!(page.body(), THIN);
    }

    #[tokio::test]
    async fn test_dynamic_domain_goes_to_browser_first() {
        let http = Arc::new(MockFetchStrategy::new().with_page("https://x.com/post", RICH));
        let browser = Arc::new(MockFetchStrategy::new().with_page("https://x.com/post", RICH));
        let fetcher = PageFetcher::new(http.clone())
            .with_browser(browser.clone())
            .with_heuristic(heuristic())
            .with_retry(fast_retry());

        fetcher.fetch(&url("https://x.com/post")).await.unwrap();
        assert_eq!(browser.fetch_count(), 1);
        assert_eq!(http.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let http = Arc::new(
            MockFetchStrategy::new()
                .with_page("https://a.com/", RICH)
                .with_transient_failures("https://a.com/", 2),
        );
        let fetcher = PageFetcher::new(http.clone()).with_retry(fast_retry());

        fetcher.fetch(&url("https://a.com/")).await.unwrap();
        assert_eq!(http.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_blocked_not_retried() {
        let http = Arc::new(MockFetchStrategy::new().with_blocked("https://a.com/", 403));
        let fetcher = PageFetcher::new(http.clone()).with_retry(fast_retry());

        let err = fetcher.fetch(&url("https://a.com/")).await.unwrap_err();
        assert!(matches!(err, FetchError::Blocked { status: 403, .. }));
        assert_eq!(http.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let http = Arc::new(
            MockFetchStrategy::new()
                .with_page("https://a.com/", RICH)
                .with_transient_failures("https://a.com/", 10),
        );
        let fetcher = PageFetcher::new(http.clone()).with_retry(fast_retry());

        let err = fetcher.fetch(&url("https://a.com/")).await.unwrap_err();
        assert!(err.kind().is_retryable());
        assert_eq!(http.fetch_count(), 3);
    }
}
