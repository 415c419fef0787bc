//! Testing utilities including mock implementations.
//!
//! Deterministic stand-ins for the search backend, fetch strategies and the
//! completion service, so pipelines can be tested without network access.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::error::{CompletionError, FetchError, FetchResult, SearchError};
use crate::traits::completion::{Completion, CompletionRequest, CompletionService};
use crate::traits::fetcher::PageFetchStrategy;
use crate::traits::searcher::{dedup_ranked, SearchResult, WebSearcher};
use crate::types::page::{FetchMethod, PageContent};

/// A mock web searcher with predefined results per query.
///
/// Queries without predefined results return the default list (empty
/// unless set).
#[derive(Default)]
pub struct MockSearcher {
    results: Arc<RwLock<HashMap<String, Vec<String>>>>,
    default_results: Arc<RwLock<Vec<String>>>,
    errors: Arc<RwLock<HashMap<String, SearchError>>>,
    transient: Arc<Mutex<VecDeque<SearchError>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add predefined result URLs for a query, in rank order.
    pub fn with_results(self, query: impl Into<String>, urls: &[&str]) -> Self {
        self.results
            .write()
            .unwrap()
            .insert(query.into(), urls.iter().map(|u| u.to_string()).collect());
        self
    }

    /// Result URLs returned for any query without its own entry.
    pub fn with_default_results(self, urls: &[&str]) -> Self {
        *self.default_results.write().unwrap() = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    /// Always fail this query.
    pub fn with_error(self, query: impl Into<String>, error: SearchError) -> Self {
        self.errors.write().unwrap().insert(query.into(), error);
        self
    }

    /// Fail the next `n` calls, whatever the query.
    pub fn with_transient_failures(self, n: usize, error: SearchError) -> Self {
        let mut transient = self.transient.lock().unwrap();
        transient.extend((0..n).map(|_| error.clone()));
        drop(transient);
        self
    }

    /// Queries searched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        self.calls.write().unwrap().push(query.to_string());

        if let Some(error) = self.transient.lock().unwrap().pop_front() {
            return Err(error);
        }
        if let Some(error) = self.errors.read().unwrap().get(query) {
            return Err(error.clone());
        }

        let urls = self
            .results
            .read()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default_results.read().unwrap().clone());

        let raw = urls.iter().enumerate().filter_map(|(i, url)| {
            SearchResult::from_url(url, i + 1).map(|r| {
                r.with_title(format!("Result {}", i + 1))
                    .with_snippet(format!("Snippet for {url}"))
            })
        });

        let mut results = dedup_ranked(raw);
        results.truncate(limit);
        Ok(results)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Decrements the in-flight counter however the fetch ends.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A mock fetch strategy with scripted pages, delays and failures.
///
/// Tracks how many fetches are running at once so tests can check
/// concurrency bounds. Unknown URLs fail with HTTP 404.
#[derive(Default)]
pub struct MockFetchStrategy {
    pages: Arc<RwLock<HashMap<String, String>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    default_delay: Option<Duration>,
    timeouts: Arc<RwLock<Vec<String>>>,
    blocked: Arc<RwLock<HashMap<String, u16>>>,
    transient: Arc<Mutex<HashMap<String, usize>>>,
    fetches: Arc<RwLock<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockFetchStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` as HTML for `url`.
    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), body.into());
        self
    }

    /// Delay every fetch of `url`.
    pub fn with_delay(self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.write().unwrap().insert(url.into(), delay);
        self
    }

    /// Delay fetches of URLs without their own delay.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Every fetch of `url` ends in a timeout.
    pub fn with_timeout(self, url: impl Into<String>) -> Self {
        self.timeouts.write().unwrap().push(url.into());
        self
    }

    /// Fetches of `url` are refused with `status`.
    pub fn with_blocked(self, url: impl Into<String>, status: u16) -> Self {
        self.blocked.write().unwrap().insert(url.into(), status);
        self
    }

    /// The first `n` fetches of `url` fail with a network error.
    pub fn with_transient_failures(self, url: impl Into<String>, n: usize) -> Self {
        self.transient.lock().unwrap().insert(url.into(), n);
        self
    }

    /// Total fetches started.
    pub fn fetch_count(&self) -> usize {
        self.fetches.read().unwrap().len()
    }

    /// Fetches started for one URL.
    pub fn fetch_count_for(&self, url: &str) -> usize {
        self.fetches.read().unwrap().iter().filter(|u| *u == url).count()
    }

    /// Fetches running right now.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of fetches ever running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetchStrategy for MockFetchStrategy {
    async fn fetch(&self, url: &Url) -> FetchResult<PageContent> {
        let key = url.as_str().to_string();
        self.fetches.write().unwrap().push(key.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = self
            .delays
            .read()
            .unwrap()
            .get(&key)
            .copied()
            .or(self.default_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.timeouts.read().unwrap().contains(&key) {
            return Err(FetchError::Timeout { url: key });
        }
        if let Some(status) = self.blocked.read().unwrap().get(&key) {
            return Err(FetchError::Blocked {
                url: key,
                status: *status,
            });
        }
        {
            let mut transient = self.transient.lock().unwrap();
            if let Some(remaining) = transient.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Network {
                        url: key,
                        source: Box::new(std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            "connection reset",
                        )),
                    });
                }
            }
        }

        match self.pages.read().unwrap().get(&key) {
            Some(body) => Ok(PageContent::new(url.clone(), body.clone(), FetchMethod::Http)
                .with_content_type("text/html")),
            None => Err(FetchError::Status {
                url: key,
                status: 404,
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Record of a call made to the mock completion service.
#[derive(Debug, Clone)]
pub struct MockCompletionCall {
    pub prompt: String,
    pub at: Instant,
}

/// A mock completion service.
///
/// Replies are chosen by the first registered needle found in the prompt,
/// falling back to the default response. Scripted errors are returned, in
/// order, before any reply.
#[derive(Default)]
pub struct MockCompletion {
    responses: Arc<RwLock<Vec<(String, String)>>>,
    default_response: Arc<RwLock<Option<String>>>,
    failures: Arc<RwLock<Vec<(String, CompletionError)>>>,
    scripted_errors: Arc<Mutex<VecDeque<CompletionError>>>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<MockCompletionCall>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `response` when the prompt contains `needle`.
    pub fn with_response_for(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses
            .write()
            .unwrap()
            .push((needle.into(), response.into()));
        self
    }

    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        *self.default_response.write().unwrap() = Some(response.into());
        self
    }

    /// Always fail prompts containing `needle`.
    pub fn with_failure_for(self, needle: impl Into<String>, error: CompletionError) -> Self {
        self.failures.write().unwrap().push((needle.into(), error));
        self
    }

    /// Fail the next calls with these errors, in order.
    pub fn with_scripted_errors(self, errors: Vec<CompletionError>) -> Self {
        self.scripted_errors.lock().unwrap().extend(errors);
        self
    }

    /// Simulated service latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<MockCompletionCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.prompt).collect()
    }

    /// When each call arrived.
    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls().into_iter().map(|c| c.at).collect()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        self.calls.write().unwrap().push(MockCompletionCall {
            prompt: request.prompt.clone(),
            at: Instant::now(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.scripted_errors.lock().unwrap().pop_front() {
            return Err(error);
        }

        let failure = self
            .failures
            .read()
            .unwrap()
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, e)| e.clone());
        if let Some(error) = failure {
            return Err(error);
        }

        let response = self
            .responses
            .read()
            .unwrap()
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, r)| r.clone())
            .or_else(|| self.default_response.read().unwrap().clone())
            .unwrap_or_else(|| "Mock summary.".to_string());

        Ok(Completion::new(response))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_searcher() {
        let searcher = MockSearcher::new()
            .with_results("rust", &["https://a.com/", "https://b.com/", "https://a.com/"]);

        let results = searcher.search("rust", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].rank, 2);
        assert!(searcher.search("other", 10).await.unwrap().is_empty());
        assert_eq!(searcher.calls(), vec!["rust", "other"]);
    }

    #[tokio::test]
    async fn test_mock_fetch_tracks_in_flight() {
        let fetcher = Arc::new(
            MockFetchStrategy::new()
                .with_page("https://a.com/", "<p>a</p>")
                .with_default_delay(Duration::from_millis(20)),
        );
        let url = Url::parse("https://a.com/").unwrap();

        let (a, b) = tokio::join!(fetcher.fetch(&url), fetcher.fetch(&url));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(fetcher.max_in_flight(), 2);
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_mock_completion_routing() {
        let mock = MockCompletion::new()
            .with_response_for("merge", "merged")
            .with_failure_for("reject-me", CompletionError::ContentRejected("no".into()));

        let reply = mock.complete(&CompletionRequest::new("please merge")).await.unwrap();
        assert_eq!(reply.text, "merged");

        let reply = mock.complete(&CompletionRequest::new("other")).await.unwrap();
        assert_eq!(reply.text, "Mock summary.");

        assert!(mock.complete(&CompletionRequest::new("reject-me")).await.is_err());
        assert_eq!(mock.call_count(), 3);
    }
}
