//! Fitting extracted text into the completion input budget.

use super::estimate_tokens;
use crate::types::fact::ExtractedFact;

/// Characters per estimated token.
const CHARS_PER_TOKEN: usize = 4;

/// Pack fact excerpts, in order, into chunks of at most `budget_tokens`
/// estimated tokens. Excerpts larger than the budget are split at word
/// boundaries.
pub fn chunk_facts(facts: &[ExtractedFact], budget_tokens: usize) -> Vec<String> {
    let texts: Vec<&str> = facts.iter().map(|f| f.text_excerpt.as_str()).collect();
    chunk_texts(&texts, budget_tokens)
}

/// Pack texts into chunks joined by blank lines.
pub fn chunk_texts(texts: &[&str], budget_tokens: usize) -> Vec<String> {
    let max_chars = budget_tokens.max(1) * CHARS_PER_TOKEN;
    let mut chunks = Vec::new();
    let mut current = String::new();

    for text in texts {
        for piece in split_words(text, max_chars) {
            let needed = if current.is_empty() {
                piece.len()
            } else {
                current.len() + 2 + piece.len()
            };
            if needed > max_chars && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&piece);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cut `text` to roughly `budget_tokens`, ending at a word boundary.
pub fn truncate_to_tokens(text: &str, budget_tokens: usize) -> String {
    if estimate_tokens(text) <= budget_tokens {
        return text.to_string();
    }
    split_words(text, budget_tokens.max(1) * CHARS_PER_TOKEN)
        .into_iter()
        .next()
        .unwrap_or_default()
}

/// Split text into pieces of at most `max_bytes`, breaking between words.
/// A single word longer than the limit is cut at a char boundary.
fn split_words(text: &str, max_bytes: usize) -> Vec<String> {
    let text = text.trim();
    if text.len() <= max_bytes {
        return if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let word = truncate_bytes(word, max_bytes);
        let needed = current.len() + usize::from(!current.is_empty()) + word.len();
        if needed > max_bytes && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn fact(text: &str) -> ExtractedFact {
        ExtractedFact::new(Url::parse("https://a.com").unwrap(), text, 1.0)
    }

    #[test]
    fn test_small_input_is_one_chunk() {
        let chunks = chunk_facts(&[fact("alpha beta"), fact("gamma delta")], 100);
        assert_eq!(chunks, vec!["alpha beta\n\ngamma delta".to_string()]);
    }

    #[test]
    fn test_chunks_respect_budget() {
        let facts: Vec<_> = (0..20)
            .map(|i| fact(&format!("passage {i} {}", "lorem ipsum ".repeat(10))))
            .collect();
        let chunks = chunk_facts(&facts, 100);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 400));
        // Order is preserved.
        assert!(chunks[0].starts_with("passage 0 "));
    }

    #[test]
    fn test_oversized_fact_is_split() {
        let big = "word ".repeat(500);
        let chunks = chunk_facts(&[fact(&big)], 50);
        assert!(chunks.len() >= 10);
        assert!(chunks.iter().all(|c| c.len() <= 200));
    }

    #[test]
    fn test_truncate_to_tokens() {
        let text = "one two three four five six seven eight";
        assert_eq!(truncate_to_tokens(text, 100), text);
        let cut = truncate_to_tokens(text, 3);
        assert!(cut.len() <= 12);
        assert!(text.starts_with(&cut));
    }

    #[test]
    fn test_multibyte_word_cut_safely() {
        let word = "é".repeat(50);
        let chunks = chunk_texts(&[word.as_str()], 5);
        assert!(chunks.iter().all(|c| c.len() <= 20));
    }
}
