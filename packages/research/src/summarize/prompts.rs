//! LLM prompts for summarization, query expansion and relevance checks.

/// System instruction shared by every summarization call.
pub const SUMMARY_SYSTEM: &str = "You are a careful research assistant. You condense source material into accurate, neutral summaries. Use only facts stated in the provided text and never invent details, numbers or sources.";

/// Prompt for condensing one chunk of a page.
pub const SUMMARIZE_PROMPT: &str = r#"Summarize the following source text as it relates to the research question.

Research question: {query}
Source: {url}{part}

Keep every fact, figure, name and date that helps answer the question.
Leave out navigation text, advertising and anything unrelated to the question.
Write plain prose in one to three short paragraphs. Do not add a heading.

--- Source text ---
{content}"#;

/// Prompt for merging partial summaries of the same page.
pub const MERGE_PROMPT: &str = r#"The following partial summaries were written for consecutive parts of one source.
Combine them into a single summary that answers the research question.

Research question: {query}
Source: {url}

Remove repetition, keep every relevant fact, and write plain prose in one to
three short paragraphs. Do not add a heading.

--- Partial summaries ---
{summaries}"#;

/// Prompt for generating search queries from a research question.
pub const EXPAND_QUERY_PROMPT: &str = r#"You generate web search queries for research on a given topic.
Extract the most important keywords from the research question and write
diverse, effective search queries of 1 to 5 words each that capture different
facets of the question.

Return 3 to 5 queries as a comma-separated list on a single line. Do not
include any other text or formatting.

Example:
Question: "What are the latest breakthroughs in renewable energy technology?"
Output: renewable energy breakthroughs, latest renewable energy, renewable energy technology, green energy innovations

Question: "How to train a dog to sit and stay?"
Output: train dog sit, dog training stay, teaching dog commands, basic dog obedience

Question: "{query}"
Output:"#;

/// Prompt for the yes/no relevance gate.
pub const RELEVANCE_PROMPT: &str = r#"Is the following article relevant to the query: "{query}"?
Respond only with 'Yes' or 'No' with no explanation.

--- Article Content ---
{content}"#;

/// Format the summarize prompt. `part` is `(index, total)` when the page
/// was split into several chunks.
pub fn format_summarize_prompt(
    query: &str,
    url: &str,
    content: &str,
    part: Option<(usize, usize)>,
) -> String {
    let part = match part {
        Some((i, n)) if n > 1 => format!(" (part {} of {})", i + 1, n),
        _ => String::new(),
    };
    SUMMARIZE_PROMPT
        .replace("{query}", query)
        .replace("{url}", url)
        .replace("{part}", &part)
        .replace("{content}", content)
}

/// Format the merge prompt.
pub fn format_merge_prompt(query: &str, url: &str, partials: &[String]) -> String {
    let summaries = partials
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[Part {}]\n{}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n\n");

    MERGE_PROMPT
        .replace("{query}", query)
        .replace("{url}", url)
        .replace("{summaries}", &summaries)
}

pub fn format_expand_query_prompt(query: &str) -> String {
    EXPAND_QUERY_PROMPT.replace("{query}", query)
}

pub fn format_relevance_prompt(query: &str, content: &str) -> String {
    RELEVANCE_PROMPT
        .replace("{query}", query)
        .replace("{content}", content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_prompt_part_marker() {
        let single = format_summarize_prompt("q", "https://a.com", "text", None);
        assert!(single.contains("Source: https://a.com\n"));
        assert!(!single.contains("part"));

        let multi = format_summarize_prompt("q", "https://a.com", "text", Some((1, 3)));
        assert!(multi.contains("(part 2 of 3)"));
    }

    #[test]
    fn test_merge_prompt_numbers_parts() {
        let prompt = format_merge_prompt("q", "u", &["one".into(), "two".into()]);
        assert!(prompt.contains("[Part 1]\none"));
        assert!(prompt.contains("[Part 2]\ntwo"));
    }

    #[test]
    fn test_no_placeholders_left() {
        for prompt in [
            format_summarize_prompt("q", "u", "c", Some((0, 2))),
            format_merge_prompt("q", "u", &["s".into()]),
            format_expand_query_prompt("q"),
            format_relevance_prompt("q", "c"),
        ] {
            assert!(!prompt.contains("{query}"));
            assert!(!prompt.contains("{content}"));
        }
    }
}
