//! Fetched page content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Which strategy produced a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMethod {
    /// Plain HTTP request, no JavaScript.
    Http,
    /// Headless browser render.
    Browser,
}

/// Raw content of a fetched page.
///
/// Owned by the fetch stage until handed to extraction. A retry produces a
/// fresh `PageContent`; an existing one is never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    url: Url,
    final_url: Url,
    body: String,
    title: Option<String>,
    content_type: Option<String>,
    status: u16,
    fetched_at: DateTime<Utc>,
    method: FetchMethod,
}

impl PageContent {
    /// Create page content for `url` with a successful status.
    pub fn new(url: Url, body: impl Into<String>, method: FetchMethod) -> Self {
        Self {
            final_url: url.clone(),
            url,
            body: body.into(),
            title: None,
            content_type: None,
            status: 200,
            fetched_at: Utc::now(),
            method,
        }
    }

    /// Record the URL after redirects.
    pub fn with_final_url(mut self, final_url: Url) -> Self {
        self.final_url = final_url;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        let title = title.trim();
        if !title.is_empty() {
            self.title = Some(title.to_string());
        }
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// The URL that was requested (the search result URL).
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn final_url(&self) -> &Url {
        &self.final_url
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn method(&self) -> FetchMethod {
        self.method
    }

    /// Whether the body should be parsed as HTML.
    ///
    /// Pages without a content type are assumed to be HTML.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            None => true,
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("html") || ct.contains("xml")
            }
        }
    }

    /// SHA-256 of the body.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.body.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_page_builder() {
        let page = PageContent::new(url("https://example.com/a"), "<p>hi</p>", FetchMethod::Http)
            .with_title("  Example  ")
            .with_content_type("text/html; charset=utf-8")
            .with_final_url(url("https://www.example.com/a"));

        assert_eq!(page.url().as_str(), "https://example.com/a");
        assert_eq!(page.final_url().as_str(), "https://www.example.com/a");
        assert_eq!(page.title(), Some("Example"));
        assert_eq!(page.status(), 200);
        assert!(page.is_html());
    }

    #[test]
    fn test_blank_title_ignored() {
        let page = PageContent::new(url("https://example.com"), "", FetchMethod::Http).with_title("  ");
        assert_eq!(page.title(), None);
    }

    #[test]
    fn test_plain_text_is_not_html() {
        let page = PageContent::new(url("https://example.com/a.txt"), "x", FetchMethod::Http)
            .with_content_type("text/plain");
        assert!(!page.is_html());
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = PageContent::new(url("https://a.com"), "same", FetchMethod::Http);
        let b = PageContent::new(url("https://b.com"), "same", FetchMethod::Browser);
        assert_eq!(a.content_hash(), b.content_hash());
    }
}
