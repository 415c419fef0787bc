//! Configuration for a research run.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::limits::{RateLimit, RetryConfig};

/// Browser-like user agent; several sites serve empty shells to bot agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Hosts that only render their content with JavaScript.
pub const DEFAULT_DYNAMIC_DOMAINS: &[&str] = &[
    "x.com",
    "twitter.com",
    "linkedin.com",
    "instagram.com",
    "facebook.com",
    "reddit.com",
];

/// Configuration for one research run.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Maximum number of unique search results to process.
    pub max_results: usize,

    /// Maximum pages in the Fetching state at once.
    pub fetch_concurrency: usize,

    /// Global budget for completion calls.
    pub summarizer_rate_limit: RateLimit,

    /// Wall-clock deadline for the whole run.
    pub timeout: Duration,

    /// Where the PDF report is written.
    pub output_path: PathBuf,

    /// Where the JSON report is written, if anywhere.
    pub json_output_path: Option<PathBuf>,

    /// Fall back to a headless browser for thin or dynamic pages.
    pub browser_fallback_enabled: bool,

    /// Maximum simultaneous browser renders.
    pub browser_concurrency: usize,

    /// Visible text (chars) below which an HTTP fetch counts as thin.
    pub thin_content_threshold: usize,

    /// Host suffixes that always go straight to the browser.
    pub dynamic_domains: Vec<String>,

    /// Per-request fetch timeout.
    pub fetch_timeout: Duration,

    /// Retry policy for transient fetch failures.
    pub fetch_retry: RetryConfig,

    /// Retry policy for each search backend call.
    pub search_retry: RetryConfig,

    /// Retry policy for completion calls.
    pub llm_retry: RetryConfig,

    /// Input budget (estimated tokens) of one completion prompt.
    pub max_input_tokens: usize,

    /// Ask the completion service for extra search queries.
    pub expand_queries: bool,

    /// Cap on searched queries, including the original question.
    pub max_search_queries: usize,

    /// Pause between consecutive search backend calls.
    pub search_interval: Duration,

    /// Ask the completion service whether each page is relevant before
    /// summarizing it.
    pub relevance_filter: bool,

    /// User agent for HTTP fetches.
    pub user_agent: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            fetch_concurrency: 5,
            summarizer_rate_limit: RateLimit::default(),
            timeout: Duration::from_secs(300),
            output_path: PathBuf::from("research_report.pdf"),
            json_output_path: None,
            browser_fallback_enabled: true,
            browser_concurrency: 2,
            thin_content_threshold: 400,
            dynamic_domains: DEFAULT_DYNAMIC_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            fetch_timeout: Duration::from_secs(30),
            fetch_retry: RetryConfig::default(),
            search_retry: RetryConfig::default(),
            llm_retry: RetryConfig::default()
                .with_max_attempts(4)
                .with_initial_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(30)),
            max_input_tokens: 6000,
            expand_queries: true,
            max_search_queries: 5,
            search_interval: Duration::from_secs(1),
            relevance_filter: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ResearchConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency;
        self
    }

    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.summarizer_rate_limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_json_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_output_path = Some(path.into());
        self
    }

    pub fn with_browser_fallback(mut self, enabled: bool) -> Self {
        self.browser_fallback_enabled = enabled;
        self
    }

    pub fn with_browser_concurrency(mut self, concurrency: usize) -> Self {
        self.browser_concurrency = concurrency;
        self
    }

    pub fn with_thin_content_threshold(mut self, chars: usize) -> Self {
        self.thin_content_threshold = chars;
        self
    }

    pub fn with_dynamic_domains(mut self, domains: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dynamic_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_fetch_retry(mut self, retry: RetryConfig) -> Self {
        self.fetch_retry = retry;
        self
    }

    pub fn with_search_retry(mut self, retry: RetryConfig) -> Self {
        self.search_retry = retry;
        self
    }

    pub fn with_llm_retry(mut self, retry: RetryConfig) -> Self {
        self.llm_retry = retry;
        self
    }

    pub fn with_max_input_tokens(mut self, tokens: usize) -> Self {
        self.max_input_tokens = tokens;
        self
    }

    pub fn with_query_expansion(mut self, enabled: bool) -> Self {
        self.expand_queries = enabled;
        self
    }

    pub fn with_max_search_queries(mut self, max: usize) -> Self {
        self.max_search_queries = max;
        self
    }

    pub fn with_search_interval(mut self, interval: Duration) -> Self {
        self.search_interval = interval;
        self
    }

    pub fn with_relevance_filter(mut self, enabled: bool) -> Self {
        self.relevance_filter = enabled;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_results == 0 {
            return Err(ConfigError::invalid("max_results", "must be at least 1"));
        }
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::invalid("fetch_concurrency", "must be at least 1"));
        }
        if self.browser_fallback_enabled && self.browser_concurrency == 0 {
            return Err(ConfigError::invalid(
                "browser_concurrency",
                "must be at least 1 when browser fallback is enabled",
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be greater than zero"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::invalid("fetch_timeout", "must be greater than zero"));
        }
        if self.max_input_tokens < 256 {
            return Err(ConfigError::invalid("max_input_tokens", "must be at least 256"));
        }
        if self.max_search_queries == 0 {
            return Err(ConfigError::invalid("max_search_queries", "must be at least 1"));
        }
        self.summarizer_rate_limit.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResearchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_results, 10);
        assert!(config.browser_fallback_enabled);
        assert!(config.dynamic_domains.iter().any(|d| d == "x.com"));
    }

    #[test]
    fn test_builder() {
        let config = ResearchConfig::new()
            .with_max_results(3)
            .with_fetch_concurrency(2)
            .with_rate_limit(RateLimit::per_second(1))
            .with_timeout(Duration::from_secs(10))
            .with_browser_fallback(false)
            .with_output_path("out/report.pdf");

        assert_eq!(config.max_results, 3);
        assert_eq!(config.fetch_concurrency, 2);
        assert_eq!(config.summarizer_rate_limit, RateLimit::per_second(1));
        assert_eq!(config.output_path, PathBuf::from("out/report.pdf"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = ResearchConfig::new().with_fetch_concurrency(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "fetch_concurrency",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ResearchConfig::new().with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_browser_concurrency_only_checked_when_enabled() {
        let config = ResearchConfig::new()
            .with_browser_fallback(false)
            .with_browser_concurrency(0);
        assert!(config.validate().is_ok());
    }
}
