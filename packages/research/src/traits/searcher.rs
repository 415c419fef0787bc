//! Web searcher trait for result discovery.
//!
//! Abstracts over search backends (DuckDuckGo, Tavily, ...). A searcher
//! returns results in the backend's relevance order; `rank` records that
//! order and is preserved all the way into the report.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SearchError;

/// A discovered URL from web search with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The discovered URL.
    pub url: Url,

    /// Title of the page (if available from search results).
    pub title: Option<String>,

    /// Snippet/description from search results.
    pub snippet: Option<String>,

    /// Position in the backend's ordering, starting at 1.
    pub rank: usize,

    /// Relevance score (0.0-1.0, if provided by search API).
    pub score: Option<f32>,
}

impl SearchResult {
    /// Create a new search result from a URL.
    pub fn new(url: Url, rank: usize) -> Self {
        Self {
            url,
            title: None,
            snippet: None,
            rank,
            score: None,
        }
    }

    /// Create from a URL string.
    pub fn from_url(url: &str, rank: usize) -> Option<Self> {
        Url::parse(url).ok().map(|u| Self::new(u, rank))
    }

    /// Add a title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.trim().is_empty() {
            self.title = Some(title.trim().to_string());
        }
        self
    }

    /// Add a snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        let snippet = snippet.into();
        if !snippet.trim().is_empty() {
            self.snippet = Some(snippet.trim().to_string());
        }
        self
    }

    /// Add a relevance score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Key used for duplicate detection: the URL without its fragment.
    pub fn dedup_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

/// Drop repeated URLs (first occurrence wins) and renumber ranks 1..n in
/// the surviving order.
pub fn dedup_ranked(results: impl IntoIterator<Item = SearchResult>) -> Vec<SearchResult> {
    let mut unique: IndexMap<String, SearchResult> = IndexMap::new();
    for result in results {
        unique.entry(result.dedup_key()).or_insert(result);
    }

    unique
        .into_values()
        .enumerate()
        .map(|(i, mut result)| {
            result.rank = i + 1;
            result
        })
        .collect()
}

/// Web search trait.
///
/// # Implementations
///
/// - `DuckDuckGoSearcher` - DuckDuckGo HTML endpoint, no key needed
/// - `TavilySearcher` - Tavily API
/// - `MockSearcher` - For testing
///
/// Implementations must return unique URLs ranked from 1; use
/// [`dedup_ranked`] on the raw backend list.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Search the web for up to `limit` results relevant to `query`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError>;

    /// Backend name (for logging).
    fn name(&self) -> &str {
        "unknown"
    }
}
