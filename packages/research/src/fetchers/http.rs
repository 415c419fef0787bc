//! Plain HTTP fetch strategy.
//!
//! Fast, but sees only the server-rendered HTML. Pages built by JavaScript
//! come back thin and are handed to the browser strategy.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{ConfigError, FetchError, FetchResult};
use crate::extract::page_title;
use crate::traits::fetcher::PageFetchStrategy;
use crate::types::config::{ResearchConfig, DEFAULT_USER_AGENT};
use crate::types::page::{FetchMethod, PageContent};

/// Fetches pages with reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,text/plain;q=0.8,*/*;q=0.5",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ConfigError::invalid("http_client", e.to_string()))?;

        Ok(Self { client })
    }

    pub fn from_config(config: &ResearchConfig) -> Result<Self, ConfigError> {
        Self::new(&config.user_agent, config.fetch_timeout)
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT, Duration::from_secs(30))
            .unwrap_or_else(|_| Self::with_client(reqwest::Client::new()))
    }
}

/// Map a non-success status to the matching fetch error.
pub fn classify_status(url: &Url, status: u16) -> Option<FetchError> {
    match status {
        200..=299 => None,
        403 | 429 => Some(FetchError::Blocked {
            url: url.to_string(),
            status,
        }),
        _ => Some(FetchError::Status {
            url: url.to_string(),
            status,
        }),
    }
}

/// Binary formats the extractor cannot read.
pub fn is_readable_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("html") || ct.contains("xml") || ct.starts_with("text/")
}

fn transport_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: Box::new(error),
        }
    }
}

#[async_trait]
impl PageFetchStrategy for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult<PageContent> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }

        debug!(url = %url, "HTTP fetch starting");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status().as_u16();
        if let Some(error) = classify_status(url, status) {
            return Err(error);
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if let Some(ct) = &content_type {
            if !is_readable_content_type(ct) {
                return Err(FetchError::UnsupportedContent {
                    url: url.to_string(),
                    content_type: ct.clone(),
                });
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(url, e))?;

        debug!(url = %url, status, bytes = body.len(), "HTTP fetch complete");

        let mut page = PageContent::new(url.clone(), body, FetchMethod::Http)
            .with_final_url(final_url)
            .with_status(status)
            .with_fetched_at(Utc::now());
        if let Some(ct) = content_type {
            page = page.with_content_type(ct);
        }
        if page.is_html() {
            if let Some(title) = page_title(page.body()) {
                page = page.with_title(title);
            }
        }

        Ok(page)
    }

    fn name(&self) -> &str {
        "http"
    }
}
