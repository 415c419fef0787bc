//! Extracted facts - cleaned passages of page text.

use serde::{Deserialize, Serialize};
use url::Url;

/// A passage of readable text taken from one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    /// Page the passage came from.
    pub source_url: Url,

    /// The cleaned passage.
    pub text_excerpt: String,

    /// How likely the passage is real content rather than chrome (0.0-1.0).
    pub confidence: f32,

    /// Position of the passage within the page, starting at 0.
    pub position: usize,
}

impl ExtractedFact {
    pub fn new(source_url: Url, text_excerpt: impl Into<String>, confidence: f32) -> Self {
        Self {
            source_url,
            text_excerpt: text_excerpt.into(),
            confidence: confidence.clamp(0.0, 1.0),
            position: 0,
        }
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn char_len(&self) -> usize {
        self.text_excerpt.chars().count()
    }
}
