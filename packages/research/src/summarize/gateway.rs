//! The single path to the completion service.
//!
//! Every completion call in a run (summaries, merges, query expansion,
//! relevance checks) goes through one [`RateLimitedCompletion`], which waits
//! on the shared limiter before each attempt and retries according to the
//! error kind.

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::error::SummarizeError;
use crate::limits::{retry, CompletionRateLimiter, RetryConfig};
use crate::traits::completion::{Completion, CompletionRequest, CompletionService};

lazy_static! {
    // Reasoning models emit their chain of thought in <think> blocks.
    static ref THINK_BLOCK: Regex = Regex::new(r"(?is)<think>.*?</think>").unwrap();
}

/// Remove reasoning blocks and surrounding whitespace from a reply.
///
/// An unterminated `<think>` swallows the rest of the reply; a stray
/// closing tag drops everything before it.
pub fn strip_reasoning(text: &str) -> String {
    let mut cleaned = THINK_BLOCK.replace_all(text, "").into_owned();

    let lower = cleaned.to_ascii_lowercase();
    if let Some(pos) = lower.find("</think>") {
        cleaned = cleaned[pos + "</think>".len()..].to_string();
    } else if let Some(pos) = lower.find("<think>") {
        cleaned.truncate(pos);
    }

    cleaned.trim().to_string()
}

/// Completion service wrapped with the shared rate limiter and retries.
#[derive(Clone)]
pub struct RateLimitedCompletion {
    service: Arc<dyn CompletionService>,
    limiter: Arc<CompletionRateLimiter>,
    retry: RetryConfig,
}

impl RateLimitedCompletion {
    pub fn new(
        service: Arc<dyn CompletionService>,
        limiter: Arc<CompletionRateLimiter>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            service,
            limiter,
            retry,
        }
    }

    pub fn limiter(&self) -> &Arc<CompletionRateLimiter> {
        &self.limiter
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Send one request. Each attempt waits for a limiter slot first, so
    /// retries count against the budget too.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion, SummarizeError> {
        retry(&self.retry, "completion", |attempt| async move {
            self.limiter.until_ready().await;
            debug!(
                service = self.service.name(),
                attempt,
                prompt_chars = request.prompt.len(),
                "Completion request"
            );

            let reply = self.service.complete(request).await?;
            let text = strip_reasoning(&reply.text);
            if text.is_empty() {
                return Err(SummarizeError::EmptyResponse);
            }

            Ok(Completion {
                text,
                completion_tokens: reply.completion_tokens,
            })
        })
        .await
    }
}

impl std::fmt::Debug for RateLimitedCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedCompletion")
            .field("service", &self.service.name())
            .field("limiter", &self.limiter)
            .field("retry", &self.retry)
            .finish()
    }
}
