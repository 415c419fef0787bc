//! Search backends and multi-query result gathering.

pub mod duckduckgo;
pub mod tavily;

pub use duckduckgo::DuckDuckGoSearcher;
pub use tavily::TavilySearcher;

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::limits::{retry, RetryConfig};
use crate::traits::searcher::{dedup_ranked, SearchResult, WebSearcher};

/// Parse a `Retry-After` header given in seconds.
pub(crate) fn retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Options for [`gather`].
#[derive(Debug, Clone)]
pub struct GatherOptions {
    /// Stop once this many unique URLs are collected.
    pub max_results: usize,

    /// Pause between consecutive backend calls.
    pub interval: Duration,

    /// Retry policy for each query.
    pub retry: RetryConfig,
}

impl GatherOptions {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            interval: Duration::from_secs(1),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Search each query in order and merge the results.
///
/// The first occurrence of a URL wins and ranks are renumbered 1..n in merge
/// order. A query that keeps failing is skipped; only when every query fails
/// is the last error returned.
pub async fn gather(
    searcher: &dyn WebSearcher,
    queries: &[String],
    options: &GatherOptions,
) -> Result<Vec<SearchResult>, SearchError> {
    let mut merged: Vec<SearchResult> = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0usize;

    for (i, query) in queries.iter().enumerate() {
        if i > 0 && !options.interval.is_zero() {
            tokio::time::sleep(options.interval).await;
        }

        let outcome = retry(&options.retry, "search", |_| {
            searcher.search(query, options.max_results)
        })
        .await;

        match outcome {
            Ok(results) => {
                succeeded += 1;
                debug!(
                    backend = searcher.name(),
                    query = %query,
                    count = results.len(),
                    "Search query returned"
                );
                merged.extend(results);
                merged = dedup_ranked(merged);
            }
            Err(e) => {
                warn!(
                    backend = searcher.name(),
                    query = %query,
                    kind = %e.kind(),
                    error = %e,
                    "Search query failed, skipping"
                );
                last_error = Some(e);
            }
        }

        if merged.len() >= options.max_results {
            break;
        }
    }

    if succeeded == 0 {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    merged.truncate(options.max_results);
    info!(
        backend = searcher.name(),
        queries = queries.len(),
        results = merged.len(),
        "Search complete"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSearcher;

    fn opts(max: usize) -> GatherOptions {
        GatherOptions::new(max)
            .with_interval(Duration::ZERO)
            .with_retry(RetryConfig::none())
    }

    fn queries(q: &[&str]) -> Vec<String> {
        q.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_merges_and_reranks() {
        let searcher = MockSearcher::new()
            .with_results("q1", &["https://a.com/", "https://b.com/"])
            .with_results("q2", &["https://b.com/", "https://c.com/"]);

        let results = gather(&searcher, &queries(&["q1", "q2"]), &opts(10))
            .await
            .unwrap();

        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/", "https://b.com/", "https://c.com/"]);
        assert_eq!(results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stops_at_max_results() {
        let searcher = MockSearcher::new()
            .with_results("q1", &["https://a.com/", "https://b.com/"])
            .with_results("q2", &["https://c.com/"]);

        let results = gather(&searcher, &queries(&["q1", "q2"]), &opts(2))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(searcher.calls(), vec!["q1".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_query_skipped() {
        let searcher = MockSearcher::new()
            .with_error("q1", SearchError::unavailable("mock", "down"))
            .with_results("q2", &["https://c.com/"]);

        let results = gather(&searcher, &queries(&["q1", "q2"]), &opts(5))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rank, 1);
    }

    #[tokio::test]
    async fn test_all_queries_failing_is_an_error() {
        let searcher = MockSearcher::new()
            .with_error("q1", SearchError::unavailable("mock", "down"))
            .with_error("q2", SearchError::unavailable("mock", "still down"));

        let err = gather(&searcher, &queries(&["q1", "q2"]), &opts(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("still down"));
    }

    #[tokio::test]
    async fn test_no_results_is_not_an_error() {
        let searcher = MockSearcher::new();
        let results = gather(&searcher, &queries(&["nothing"]), &opts(5))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_query_retried() {
        let searcher = MockSearcher::new()
            .with_results("q1", &["https://a.com/"])
            .with_transient_failures(
                1,
                SearchError::RateLimited {
                    backend: "mock".into(),
                    retry_after: Some(Duration::from_millis(1)),
                },
            );

        let options = opts(5).with_retry(
            RetryConfig::default()
                .with_initial_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(2)),
        );
        let results = gather(&searcher, &queries(&["q1"]), &options).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(searcher.calls().len(), 2);
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "3".parse().unwrap());
        assert_eq!(retry_after_header(&headers), Some(Duration::from_secs(3)));

        headers.insert(reqwest::header::RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(retry_after_header(&headers), None);
    }
}
