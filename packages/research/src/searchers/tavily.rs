//! Tavily search backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::SearchError;
use crate::secret::ApiKey;
use crate::traits::searcher::{dedup_ranked, SearchResult, WebSearcher};

const ENDPOINT: &str = "https://api.tavily.com/search";
const BACKEND: &str = "tavily";

/// Tavily-backed web searcher.
///
/// Uses Tavily's search API; results carry a relevance score.
pub struct TavilySearcher {
    client: reqwest::Client,
    api_key: ApiKey,
    endpoint: String,
}

#[derive(Serialize)]
struct Request<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct Response {
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    url: String,
    title: Option<String>,
    content: Option<String>,
    score: Option<f32>,
}

impl TavilySearcher {
    /// Create a new Tavily searcher.
    pub fn new(api_key: impl Into<ApiKey>) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SearchError::unavailable(BACKEND, e))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        debug!(query = %query, limit, "Tavily search");

        let request = Request {
            query,
            search_depth: "basic",
            max_results: limit,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::unavailable(BACKEND, e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SearchError::RateLimited {
                backend: BACKEND.to_string(),
                retry_after: super::retry_after_header(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(SearchError::unavailable(
                BACKEND,
                format!("Tavily API error: {status}"),
            ));
        }

        let body: Response = response
            .json()
            .await
            .map_err(|e| SearchError::unavailable(BACKEND, e))?;

        Ok(into_results(body, limit))
    }

    fn name(&self) -> &str {
        BACKEND
    }
}

fn into_results(response: Response, limit: usize) -> Vec<SearchResult> {
    let raw = response.results.into_iter().filter_map(|r| {
        let url = Url::parse(&r.url).ok()?;
        let mut result = SearchResult::new(url, 0);
        if let Some(title) = r.title {
            result = result.with_title(title);
        }
        if let Some(content) = r.content {
            result = result.with_snippet(content);
        }
        if let Some(score) = r.score {
            result = result.with_score(score);
        }
        Some(result)
    });

    let mut results = dedup_ranked(raw);
    results.truncate(limit);
    results
}
