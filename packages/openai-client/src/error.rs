//! Error types for OpenAI client.

use std::time::Duration;
use thiserror::Error;

/// Result type for OpenAI client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// OpenAI client errors.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 429. `retry_after` comes from the `Retry-After` header.
    #[error("Rate limited by API")]
    RateLimited { retry_after: Option<Duration> },

    /// The API refused the input (content policy, context length).
    #[error("Request rejected: {0}")]
    ContentRejected(String),

    /// Any other non-2xx response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OpenAIError {
    /// Classify a non-success response.
    pub fn from_response(status: u16, retry_after: Option<Duration>, body: &str) -> Self {
        if status == 429 {
            return Self::RateLimited { retry_after };
        }

        let lower = body.to_ascii_lowercase();
        let rejected = status == 413
            || ((status == 400 || status == 422)
                && (lower.contains("content_policy")
                    || lower.contains("content_filter")
                    || lower.contains("context_length")
                    || lower.contains("maximum context")));
        if rejected {
            return Self::ContentRejected(body.to_string());
        }

        Self::Api {
            status,
            message: body.to_string(),
        }
    }

    /// Whether a later attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        let err = OpenAIError::from_response(429, Some(Duration::from_secs(3)), "slow down");
        assert!(matches!(
            err,
            OpenAIError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_rejection() {
        let body = r#"{"error":{"code":"context_length_exceeded"}}"#;
        assert!(matches!(
            OpenAIError::from_response(400, None, body),
            OpenAIError::ContentRejected(_)
        ));
        assert!(matches!(
            OpenAIError::from_response(413, None, "too large"),
            OpenAIError::ContentRejected(_)
        ));
    }

    #[test]
    fn test_classify_other() {
        let server = OpenAIError::from_response(503, None, "unavailable");
        assert!(server.is_transient());

        let bad = OpenAIError::from_response(401, None, "bad key");
        assert!(matches!(bad, OpenAIError::Api { status: 401, .. }));
        assert!(!bad.is_transient());
    }
}
