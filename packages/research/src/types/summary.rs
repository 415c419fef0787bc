//! Condensed, query-relevant page summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// The condensed text produced for one successfully processed page.
///
/// Pages that fail anywhere in the pipeline produce no `Summary` at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// URL of the search result this summary was produced from.
    pub source_url: Url,

    /// Rank of that search result (1-based).
    pub rank: usize,

    /// Page title, if one was found.
    pub title: Option<String>,

    /// The summary text.
    pub condensed_text: String,

    /// Tokens in `condensed_text` (reported by the service or estimated).
    pub token_count: usize,

    /// When the source page was retrieved.
    pub fetched_at: DateTime<Utc>,

    /// Number of input chunks the page was split into.
    pub chunk_count: usize,
}

impl Summary {
    pub fn new(source_url: Url, rank: usize, condensed_text: impl Into<String>) -> Self {
        let condensed_text = condensed_text.into();
        Self {
            token_count: crate::summarize::estimate_tokens(&condensed_text),
            source_url,
            rank,
            title: None,
            condensed_text,
            fetched_at: Utc::now(),
            chunk_count: 1,
        }
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_token_count(mut self, token_count: usize) -> Self {
        self.token_count = token_count;
        self
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    pub fn with_chunk_count(mut self, chunk_count: usize) -> Self {
        self.chunk_count = chunk_count;
        self
    }

    /// Title if known, otherwise the host of the source URL.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => self
                .source_url
                .host_str()
                .unwrap_or(self.source_url.as_str())
                .to_string(),
        }
    }
}
