//! Turning a research question into several search queries.

use std::collections::HashSet;
use tracing::{info, warn};

use super::gateway::RateLimitedCompletion;
use super::prompts::format_expand_query_prompt;
use crate::traits::completion::CompletionRequest;

/// Generates extra search queries covering different facets of a question.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    completion: RateLimitedCompletion,
    max_queries: usize,
}

impl QueryExpander {
    /// `max_queries` includes the original question.
    pub fn new(completion: RateLimitedCompletion, max_queries: usize) -> Self {
        Self {
            completion,
            max_queries: max_queries.max(1),
        }
    }

    /// The question itself first, followed by generated queries.
    ///
    /// Never fails: if the completion service errors, only the question is
    /// searched.
    pub async fn expand(&self, question: &str) -> Vec<String> {
        if self.max_queries == 1 {
            return vec![question.to_string()];
        }

        let request = CompletionRequest::new(format_expand_query_prompt(question))
            .with_max_output_tokens(120)
            .with_temperature(0.3);

        match self.completion.complete(&request).await {
            Ok(reply) => {
                let queries = merge_queries(question, parse_queries(&reply.text), self.max_queries);
                info!(queries = ?queries, "Expanded search queries");
                queries
            }
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Query expansion failed, searching the question only");
                vec![question.to_string()]
            }
        }
    }
}

/// Parse the comma-separated list on the last non-empty line of a reply.
pub fn parse_queries(reply: &str) -> Vec<String> {
    let Some(line) = reply.lines().map(str::trim).filter(|l| !l.is_empty()).last() else {
        return Vec::new();
    };
    let line = line
        .strip_prefix("Output:")
        .or_else(|| line.strip_prefix("output:"))
        .unwrap_or(line);

    line.split(',')
        .map(|q| {
            q.trim()
                .trim_start_matches(['-', '*'])
                .trim()
                .trim_matches(['"', '\'', '`'])
                .trim()
                .to_string()
        })
        .filter(|q| !q.is_empty())
        .collect()
}

/// Question first, then generated queries, without case-insensitive
/// repeats, capped at `max`.
fn merge_queries(question: &str, generated: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    std::iter::once(question.to_string())
        .chain(generated)
        .filter(|q| seen.insert(q.to_lowercase()))
        .take(max)
        .collect()
}
