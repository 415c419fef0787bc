//! DuckDuckGo HTML search backend.
//!
//! Posts the query to the key-less HTML endpoint and scrapes the result
//! list. Result links point at a DuckDuckGo redirect (`/l/?uddg=...`); the
//! real destination is decoded from the `uddg` parameter.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::SearchError;
use crate::traits::searcher::{dedup_ranked, SearchResult, WebSearcher};
use crate::types::config::DEFAULT_USER_AGENT;

const ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const BACKEND: &str = "duckduckgo";

/// Key-less web searcher backed by DuckDuckGo's HTML results page.
pub struct DuckDuckGoSearcher {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearcher {
    pub fn new() -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| SearchError::unavailable(BACKEND, e))?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: ENDPOINT.to_string(),
        }
    }

    /// Point at a different endpoint (local test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl WebSearcher for DuckDuckGoSearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        debug!(query = %query, limit, "DuckDuckGo search");

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query)])
            .header("Accept", "text/html")
            .send()
            .await
            .map_err(|e| SearchError::unavailable(BACKEND, e))?;

        let status = response.status();
        if status.as_u16() == 429 || status.as_u16() == 202 {
            return Err(SearchError::RateLimited {
                backend: BACKEND.to_string(),
                retry_after: super::retry_after_header(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(SearchError::unavailable(BACKEND, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::unavailable(BACKEND, e))?;

        if is_challenge_page(&body) {
            return Err(SearchError::RateLimited {
                backend: BACKEND.to_string(),
                retry_after: None,
            });
        }

        let results = parse_results(&body, limit);
        debug!(query = %query, count = results.len(), "DuckDuckGo results parsed");
        Ok(results)
    }

    fn name(&self) -> &str {
        BACKEND
    }
}

/// DuckDuckGo answers bursts of automated queries with a bot-check page
/// instead of results.
fn is_challenge_page(html: &str) -> bool {
    html.contains("anomaly-modal") || html.contains("Unfortunately, bots use DuckDuckGo too")
}

/// Parse the HTML results page into unique, ranked results.
///
/// Ads and entries without an http(s) destination are skipped.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let document = Html::parse_document(html);

    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse("a.result__a"),
        Selector::parse("a.result__snippet, .result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut raw = Vec::new();
    for result in document.select(&result_sel) {
        if result
            .value()
            .classes()
            .any(|c| c == "result--ad" || c == "result--ad--small")
        {
            continue;
        }

        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_result_url(href) else {
            continue;
        };

        let title = link.text().collect::<String>();
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();

        raw.push(
            SearchResult::new(url, raw.len() + 1)
                .with_title(title)
                .with_snippet(snippet),
        );
    }

    let mut results = dedup_ranked(raw);
    results.truncate(limit);
    results
}

/// Turn a result href into the destination URL, unwrapping redirect links
/// like `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=...`.
fn resolve_result_url(href: &str) -> Option<Url> {
    let target = match href.find("uddg=") {
        Some(pos) => {
            let start = pos + "uddg=".len();
            let end = href[start..]
                .find('&')
                .map(|i| start + i)
                .unwrap_or(href.len());
            urlencoding::decode(&href[start..end]).ok()?.into_owned()
        }
        None => href.to_string(),
    };

    let url = Url::parse(&target).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}
