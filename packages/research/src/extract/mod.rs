//! Content extraction: raw page to passages.
//!
//! Extraction is a pure function of the page body. Running it twice on the
//! same `PageContent` yields the same facts in the same order.

pub mod html;

use std::collections::HashSet;
use tracing::debug;

use crate::error::ExtractError;
use crate::types::fact::ExtractedFact;
use crate::types::page::PageContent;

pub use html::{page_title, text_lines};

/// Lines shorter than this (in words) are kept only when they end a
/// sentence.
const MIN_LINE_WORDS: usize = 4;

/// Turns fetched pages into passages of readable text.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    max_passage_chars: usize,
    min_line_words: usize,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self {
            max_passage_chars: 1200,
            min_line_words: MIN_LINE_WORDS,
        }
    }
}

impl ContentExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound on the length of one passage.
    pub fn with_max_passage_chars(mut self, chars: usize) -> Self {
        self.max_passage_chars = chars.max(80);
        self
    }

    pub fn with_min_line_words(mut self, words: usize) -> Self {
        self.min_line_words = words;
        self
    }

    /// Extract passages from a page.
    ///
    /// Fails with [`ExtractError::Empty`] when nothing readable survives
    /// cleaning.
    pub fn extract(&self, page: &PageContent) -> Result<Vec<ExtractedFact>, ExtractError> {
        let lines = page_lines(page);

        let mut seen = HashSet::new();
        let kept: Vec<String> = lines
            .into_iter()
            .filter(|line| self.keep_line(line))
            .filter(|line| seen.insert(line.clone()))
            .collect();

        let passages = self.group(&kept);
        if passages.is_empty() {
            return Err(ExtractError::Empty {
                url: page.url().to_string(),
            });
        }

        let facts: Vec<ExtractedFact> = passages
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let confidence = passage_confidence(&text);
                ExtractedFact::new(page.url().clone(), text, confidence).at_position(i)
            })
            .collect();

        debug!(
            url = %page.url(),
            passages = facts.len(),
            chars = facts.iter().map(|f| f.char_len()).sum::<usize>(),
            "Extracted passages"
        );
        Ok(facts)
    }

    fn keep_line(&self, line: &str) -> bool {
        let words = line.split_whitespace().count();
        if words >= self.min_line_words {
            return true;
        }
        words >= 2 && line.ends_with(['.', '!', '?'])
    }

    /// Pack lines into passages no longer than `max_passage_chars`.
    fn group(&self, lines: &[String]) -> Vec<String> {
        let mut passages = Vec::new();
        let mut current = String::new();

        for line in lines {
            for piece in split_long(line, self.max_passage_chars) {
                let needed = if current.is_empty() {
                    piece.chars().count()
                } else {
                    current.chars().count() + 1 + piece.chars().count()
                };
                if needed > self.max_passage_chars && !current.is_empty() {
                    passages.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(&piece);
            }
        }

        if !current.is_empty() {
            passages.push(current);
        }
        passages
    }
}

/// Visible text lines of a page, HTML or plain text.
fn page_lines(page: &PageContent) -> Vec<String> {
    if page.is_html() {
        text_lines(page.body())
    } else {
        page.body()
            .lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|l| !l.is_empty())
            .collect()
    }
}

/// Characters of visible text on a page. Used to detect thin responses.
pub fn visible_text_len(page: &PageContent) -> usize {
    page_lines(page).iter().map(|l| l.chars().count()).sum()
}

/// Split a line longer than `max_chars` at word boundaries.
fn split_long(line: &str, max_chars: usize) -> Vec<String> {
    if line.chars().count() <= max_chars {
        return vec![line.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let word: String = word.chars().take(max_chars).collect();
        let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
        if needed > max_chars && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Longer, prose-like passages score higher than short fragments.
fn passage_confidence(text: &str) -> f32 {
    let chars = text.chars().count() as f32;
    let alphabetic = text.chars().filter(|c| c.is_alphabetic()).count() as f32;
    let density = if chars > 0.0 { alphabetic / chars } else { 0.0 };
    let length = (chars / 600.0).min(1.0);
    0.3 + 0.4 * length + 0.3 * density
}
