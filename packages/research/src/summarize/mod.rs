//! Summarization through the rate-limited completion service.
//!
//! Facts that fit the input budget are summarized in one call. Larger inputs
//! are chunked, each chunk is summarized, and the partial summaries are
//! merged (chunk-then-merge).

pub mod chunk;
pub mod expand;
pub mod gateway;
pub mod prompts;
pub mod relevance;

pub use expand::QueryExpander;
pub use gateway::{strip_reasoning, RateLimitedCompletion};
pub use relevance::RelevanceChecker;

use tracing::{debug, warn};

use crate::error::SummarizeError;
use crate::traits::completion::CompletionRequest;
use crate::types::fact::ExtractedFact;
use crate::types::summary::Summary;
use chunk::{chunk_facts, truncate_to_tokens};
use prompts::{format_merge_prompt, format_summarize_prompt, SUMMARY_SYSTEM};

/// Merge rounds before the remaining partials are squeezed into one final merge.
const MAX_MERGE_ROUNDS: usize = 3;

/// Tokens reserved for the prompt template, system text and question.
const PROMPT_OVERHEAD_TOKENS: usize = 300;

/// Rough token estimate (about four characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Condenses a page's facts into a query-relevant summary.
#[derive(Debug, Clone)]
pub struct Summarizer {
    completion: RateLimitedCompletion,
    max_input_tokens: usize,
    max_output_tokens: u32,
}

impl Summarizer {
    pub fn new(completion: RateLimitedCompletion, max_input_tokens: usize) -> Self {
        Self {
            completion,
            max_input_tokens,
            max_output_tokens: 600,
        }
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Tokens of source text that fit in one prompt next to the question.
    fn content_budget(&self, query: &str) -> usize {
        self.max_input_tokens
            .saturating_sub(PROMPT_OVERHEAD_TOKENS + estimate_tokens(query))
            .max(128)
    }

    fn request(&self, prompt: String) -> CompletionRequest {
        CompletionRequest::new(prompt)
            .with_system(SUMMARY_SYSTEM)
            .with_max_output_tokens(self.max_output_tokens)
            .with_temperature(0.2)
    }

    /// Summarize one page's facts.
    ///
    /// The returned summary carries rank 0; the caller assigns the page's
    /// search rank.
    pub async fn summarize(&self, query: &str, facts: &[ExtractedFact]) -> Result<Summary, SummarizeError> {
        let Some(first) = facts.first() else {
            return Err(SummarizeError::NoFacts);
        };
        let source_url = first.source_url.clone();
        let url = source_url.as_str();
        let budget = self.content_budget(query);

        let chunks = chunk_facts(facts, budget);
        let chunk_count = chunks.len();
        if chunk_count == 0 {
            return Err(SummarizeError::NoFacts);
        }
        debug!(url = %url, chunks = chunk_count, budget, "Summarizing");

        let mut partials = Vec::with_capacity(chunk_count);
        let mut last_tokens = None;
        for (i, chunk) in chunks.iter().enumerate() {
            let prompt = format_summarize_prompt(query, url, chunk, Some((i, chunk_count)));
            let reply = self.completion.complete(&self.request(prompt)).await?;
            last_tokens = reply.completion_tokens;
            partials.push(reply.text);
        }

        let mut round = 0;
        while partials.len() > 1 {
            round += 1;
            let groups = group_partials(&partials, budget);
            let stalled = groups.iter().all(|group| group.len() == 1);

            if stalled || round >= MAX_MERGE_ROUNDS {
                // Final merge: every partial gets an equal share of one prompt
                let share = (budget / partials.len()).max(1);
                let squeezed: Vec<String> =
                    partials.iter().map(|p| truncate_to_tokens(p, share)).collect();
                if stalled {
                    warn!(url = %url, partials = partials.len(), share, "Partials too large to group, squeezing into one merge");
                }
                let prompt = format_merge_prompt(query, url, &squeezed);
                let reply = self.completion.complete(&self.request(prompt)).await?;
                last_tokens = reply.completion_tokens;
                debug!(url = %url, round, before = partials.len(), after = 1, "Final merge");
                partials = vec![reply.text];
                break;
            }

            let mut merged = Vec::new();
            for group in groups {
                if group.len() == 1 {
                    merged.extend(group);
                    continue;
                }
                let prompt = format_merge_prompt(query, url, &group);
                let reply = self.completion.complete(&self.request(prompt)).await?;
                last_tokens = reply.completion_tokens;
                merged.push(reply.text);
            }
            debug!(url = %url, round, before = partials.len(), after = merged.len(), "Merge round");
            partials = merged;
        }

        let text = partials.pop().unwrap_or_default();
        let tokens = last_tokens
            .map(|t| t as usize)
            .unwrap_or_else(|| estimate_tokens(&text));

        Ok(Summary::new(source_url, 0, text)
            .with_token_count(tokens)
            .with_chunk_count(chunk_count))
    }
}

/// Pack consecutive partial summaries into groups that fit the budget.
fn group_partials(partials: &[String], budget_tokens: usize) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut used = 0;

    for partial in partials {
        let tokens = estimate_tokens(partial);
        if !current.is_empty() && used + tokens > budget_tokens {
            groups.push(std::mem::take(&mut current));
            used = 0;
        }
        used += tokens;
        current.push(partial.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{CompletionRateLimiter, RateLimit, RetryConfig};
    use crate::testing::MockCompletion;
    use std::sync::Arc;
    use url::Url;

    fn summarizer(mock: Arc<MockCompletion>, max_input_tokens: usize) -> Summarizer {
        let limiter = Arc::new(CompletionRateLimiter::new(RateLimit::per_second(1000)).unwrap());
        let completion = RateLimitedCompletion::new(mock, limiter, RetryConfig::none());
        Summarizer::new(completion, max_input_tokens)
    }

    fn facts(n: usize, words: usize) -> Vec<ExtractedFact> {
        let url = Url::parse("https://example.com/doc").unwrap();
        (0..n)
            .map(|i| {
                ExtractedFact::new(url.clone(), format!("fact {i} {}", "word ".repeat(words)), 0.9)
                    .at_position(i)
            })
            .collect()
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[tokio::test]
    async fn test_single_chunk_single_call() {
        let mock = Arc::new(MockCompletion::new().with_default_response("A short summary."));
        let summary = summarizer(mock.clone(), 6000)
            .summarize("what is it", &facts(3, 10))
            .await
            .unwrap();

        assert_eq!(summary.condensed_text, "A short summary.");
        assert_eq!(summary.source_url.as_str(), "https://example.com/doc");
        assert_eq!(summary.chunk_count, 1);
        assert_eq!(mock.call_count(), 1);
        assert!(mock.prompts()[0].contains("what is it"));
    }

    #[tokio::test]
    async fn test_chunk_then_merge() {
        let mock = Arc::new(
            MockCompletion::new()
                .with_response_for("partial summaries", "Merged summary.")
                .with_default_response("Chunk summary."),
        );
        // Budget of 128 tokens (512 chars) per chunk; 20 facts of ~400 chars.
        let summary = summarizer(mock.clone(), 256)
            .summarize("q", &facts(20, 80))
            .await
            .unwrap();

        assert_eq!(summary.condensed_text, "Merged summary.");
        assert!(summary.chunk_count > 1);
        // One call per chunk plus one merge.
        assert_eq!(mock.call_count(), summary.chunk_count + 1);
    }

    #[tokio::test]
    async fn test_no_facts() {
        let mock = Arc::new(MockCompletion::new());
        let err = summarizer(mock.clone(), 6000).summarize("q", &[]).await.unwrap_err();
        assert!(matches!(err, SummarizeError::NoFacts));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rejection_fails_page() {
        let mock = Arc::new(MockCompletion::new().with_scripted_errors(vec![
            crate::error::CompletionError::ContentRejected("too long".into()),
        ]));
        let err = summarizer(mock, 6000).summarize("q", &facts(1, 5)).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ServiceRejected);
    }

    #[tokio::test]
    async fn test_large_partials_still_merged() {
        // Each chunk reply is ~90 tokens, more than half the 128-token budget,
        // so no two partials fit in one group.
        let mock = Arc::new(
            MockCompletion::new()
                .with_response_for("partial summaries", "Merged summary.")
                .with_default_response(&"partial ".repeat(45)),
        );
        let summary = summarizer(mock.clone(), 256)
            .summarize("q", &facts(10, 80))
            .await
            .unwrap();

        assert_eq!(summary.condensed_text, "Merged summary.");
        assert!(summary.chunk_count > 1);
        assert_eq!(mock.call_count(), summary.chunk_count + 1);

        let merge_prompts: Vec<String> = mock
            .prompts()
            .into_iter()
            .filter(|p| p.contains("partial summaries"))
            .collect();
        assert_eq!(merge_prompts.len(), 1);
        // Squeezed partials fit within the content budget (plus the template)
        assert!(estimate_tokens(&merge_prompts[0]) < 256 + PROMPT_OVERHEAD_TOKENS);
    }

    #[test]
    fn test_group_partials() {
        let partials: Vec<String> = (0..5).map(|_| "x".repeat(40)).collect();
        let groups = group_partials(&partials, 25);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups.iter().map(|g| g.len()).sum::<usize>(), 5);
    }
}
