//! Yes/no relevance gate run before summarizing a page.

use tracing::debug;

use super::gateway::RateLimitedCompletion;
use super::prompts::format_relevance_prompt;
use crate::error::SummarizeError;
use crate::traits::completion::CompletionRequest;
use crate::types::fact::ExtractedFact;

/// Characters of page text shown to the model.
const EXCERPT_CHARS: usize = 2000;

/// Asks the completion service whether a page is about the question.
#[derive(Debug, Clone)]
pub struct RelevanceChecker {
    completion: RateLimitedCompletion,
}

impl RelevanceChecker {
    pub fn new(completion: RateLimitedCompletion) -> Self {
        Self { completion }
    }

    pub async fn is_relevant(&self, query: &str, facts: &[ExtractedFact]) -> Result<bool, SummarizeError> {
        let excerpt = excerpt(facts);
        let request = CompletionRequest::new(format_relevance_prompt(query, &excerpt))
            .with_max_output_tokens(16)
            .with_temperature(0.0);

        let reply = self.completion.complete(&request).await?;
        let relevant = reply.text.to_lowercase().contains("yes");
        debug!(answer = %reply.text, relevant, "Relevance check");
        Ok(relevant)
    }
}

/// The first `EXCERPT_CHARS` characters of the page's passages.
fn excerpt(facts: &[ExtractedFact]) -> String {
    facts
        .iter()
        .map(|f| f.text_excerpt.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
        .chars()
        .take(EXCERPT_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{CompletionRateLimiter, RateLimit, RetryConfig};
    use crate::testing::MockCompletion;
    use std::sync::Arc;
    use url::Url;

    fn checker(answer: &str) -> (RelevanceChecker, Arc<MockCompletion>) {
        let mock = Arc::new(MockCompletion::new().with_default_response(answer));
        let limiter = Arc::new(CompletionRateLimiter::new(RateLimit::per_second(1000)).unwrap());
        let completion = RateLimitedCompletion::new(mock.clone(), limiter, RetryConfig::none());
        (RelevanceChecker::new(completion), mock)
    }

    fn fact(text: &str) -> ExtractedFact {
        ExtractedFact::new(Url::parse("https://a.com").unwrap(), text, 1.0)
    }

    #[tokio::test]
    async fn test_yes_and_no() {
        let (yes, _) = checker("Yes.");
        assert!(yes.is_relevant("q", &[fact("text")]).await.unwrap());

        let (no, _) = checker("No");
        assert!(!no.is_relevant("q", &[fact("text")]).await.unwrap());
    }

    #[tokio::test]
    async fn test_excerpt_is_capped() {
        let (checker, mock) = checker("yes");
        let long = "a".repeat(5000);
        checker.is_relevant("q", &[fact(&long)]).await.unwrap();

        let prompt = &mock.prompts()[0];
        assert!(prompt.contains(&"a".repeat(2000)));
        assert!(!prompt.contains(&"a".repeat(2001)));
    }
}
