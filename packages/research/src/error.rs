//! Typed errors for the research pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Every error maps onto
//! an [`ErrorKind`], and retry/exclusion decisions are made from the kind
//! alone.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used as a `#[source]` for transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How a failure affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network hiccup or flaky service. Retried with bounded backoff.
    TransientNetwork,
    /// Throttled by a backend. Retried honoring the backoff hint.
    RateLimited,
    /// The page has nothing usable. Excluded, run continues.
    ContentUnavailable,
    /// A service refused the content. Excluded, run continues.
    ServiceRejected,
    /// Aborts the run.
    Fatal,
}

impl ErrorKind {
    /// Whether an operation failing with this kind may be attempted again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TransientNetwork | Self::RateLimited)
    }

    /// Whether this kind aborts the whole run.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient_network",
            Self::RateLimited => "rate_limited",
            Self::ContentUnavailable => "content_unavailable",
            Self::ServiceRejected => "service_rejected",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from a search backend.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// Backend outage, transport failure or unreadable response.
    #[error("search backend {backend} unavailable: {message}")]
    Unavailable { backend: String, message: String },

    /// Backend throttled the request; the caller must back off.
    #[error("search backend {backend} rate limited")]
    RateLimited {
        backend: String,
        retry_after: Option<Duration>,
    },
}

impl SearchError {
    pub fn unavailable(backend: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable { .. } => ErrorKind::TransientNetwork,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
        }
    }

    /// Backoff hint supplied by the backend, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            Self::Unavailable { .. } => None,
        }
    }
}

/// Errors from fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete in time.
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// The site refused us (HTTP 403/429). Never retried.
    #[error("blocked ({status}) fetching: {url}")]
    Blocked { url: String, status: u16 },

    /// Any other non-success status.
    #[error("HTTP {status} fetching: {url}")]
    Status { url: String, status: u16 },

    /// Transport failure (DNS, connection reset, TLS).
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: BoxError,
    },

    /// The headless browser failed to render the page.
    #[error("browser error rendering {url}: {message}")]
    Browser { url: String, message: String },

    /// The response is not a document we can read.
    #[error("unsupported content type {content_type} at {url}")]
    UnsupportedContent { url: String, content_type: String },

    /// URL could not be parsed or uses a non-HTTP scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } | Self::Network { .. } | Self::Browser { .. } => {
                ErrorKind::TransientNetwork
            }
            Self::Status { status, .. } if *status >= 500 => ErrorKind::TransientNetwork,
            Self::Status { .. }
            | Self::Blocked { .. }
            | Self::UnsupportedContent { .. }
            | Self::InvalidUrl { .. } => ErrorKind::ContentUnavailable,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Blocked { url, .. }
            | Self::Status { url, .. }
            | Self::Network { url, .. }
            | Self::Browser { url, .. }
            | Self::UnsupportedContent { url, .. }
            | Self::InvalidUrl { url } => url,
        }
    }
}

/// Errors from content extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Nothing readable survived boilerplate removal.
    #[error("no usable text in: {url}")]
    Empty { url: String },
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ContentUnavailable
    }
}

/// Errors reported by a completion service implementation.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// Requests-per-minute or token budget exhausted.
    #[error("completion service rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Server error, malformed reply or transport failure.
    #[error("completion service error: {0}")]
    Service(String),

    /// The service refused the prompt (content policy, input too large).
    #[error("completion rejected: {0}")]
    ContentRejected(String),
}

impl CompletionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Service(_) => ErrorKind::TransientNetwork,
            Self::ContentRejected(_) => ErrorKind::ServiceRejected,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Errors from the summarization stage.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// The service answered with nothing once reasoning blocks were removed.
    #[error("completion service returned an empty reply")]
    EmptyResponse,

    /// Summarize was called without any facts.
    #[error("no facts to summarize")]
    NoFacts,
}

impl SummarizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Completion(e) => e.kind(),
            Self::EmptyResponse => ErrorKind::TransientNetwork,
            Self::NoFacts => ErrorKind::ContentUnavailable,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Completion(e) => e.retry_after(),
            _ => None,
        }
    }
}

/// Errors from report assembly and rendering.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Zero summaries were available.
    #[error("no summaries available, refusing to build an empty report")]
    Empty,

    /// No usable TrueType font family was found for PDF rendering.
    #[error("no font family found (searched: {searched})")]
    FontUnavailable { searched: String },

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Fatal
    }
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid rate limit {input:?}, expected N/<interval> such as 30/60s or 1/s")]
    RateLimitFormat { input: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// A task was asked to move backwards or out of a terminal state.
#[derive(Debug, Error)]
#[error("task {task} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub task: usize,
    pub from: &'static str,
    pub to: &'static str,
}

/// Run-level errors. All of them are fatal for the run.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// Every search attempt failed.
    #[error("search failed: {0}")]
    Search(#[from] SearchError),

    /// The wall-clock deadline passed before any page completed.
    #[error("deadline of {timeout:?} exceeded with no completed pages")]
    DeadlineExceeded { timeout: Duration },

    #[error("run cancelled before any page completed")]
    Cancelled,

    #[error("report error: {0}")]
    Report(#[from] ReportError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal state error: {0}")]
    Transition(#[from] TransitionError),
}

impl ResearchError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Fatal
    }

    /// True when the run ended without a single summary to report.
    pub fn is_report_empty(&self) -> bool {
        matches!(self, Self::Report(ReportError::Empty))
    }
}

/// Result type alias for run-level operations.
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kinds() {
        let timeout = FetchError::Timeout {
            url: "https://a.com".into(),
        };
        assert_eq!(timeout.kind(), ErrorKind::TransientNetwork);
        assert!(timeout.kind().is_retryable());

        let blocked = FetchError::Blocked {
            url: "https://a.com".into(),
            status: 403,
        };
        assert_eq!(blocked.kind(), ErrorKind::ContentUnavailable);
        assert!(!blocked.kind().is_retryable());

        let server = FetchError::Status {
            url: "https://a.com".into(),
            status: 503,
        };
        assert!(server.kind().is_retryable());

        let missing = FetchError::Status {
            url: "https://a.com".into(),
            status: 404,
        };
        assert_eq!(missing.kind(), ErrorKind::ContentUnavailable);
    }

    #[test]
    fn test_completion_error_kinds() {
        let limited = CompletionError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(limited.kind(), ErrorKind::RateLimited);
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(2)));

        let rejected = SummarizeError::from(CompletionError::ContentRejected("policy".into()));
        assert_eq!(rejected.kind(), ErrorKind::ServiceRejected);
        assert!(!rejected.kind().is_retryable());
    }

    #[test]
    fn test_run_errors_are_fatal() {
        let err = ResearchError::from(ReportError::Empty);
        assert!(err.kind().is_fatal());
        assert!(err.is_report_empty());
        assert_eq!(ErrorKind::Fatal.to_string(), "fatal");
    }
}
