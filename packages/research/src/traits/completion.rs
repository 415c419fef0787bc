//! Completion service trait for LLM calls.
//!
//! Implementations wrap a specific provider and translate its failures into
//! [`CompletionError`]. They do no retrying or rate limiting of their own;
//! that happens in `RateLimitedCompletion`.

use async_trait::async_trait;

use crate::error::CompletionError;

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Optional system instruction.
    pub system: Option<String>,

    /// The user prompt.
    pub prompt: String,

    /// Cap on generated tokens.
    pub max_output_tokens: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_output_tokens: None,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A completion reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,

    /// Tokens generated, when the provider reports usage.
    pub completion_tokens: Option<u32>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completion_tokens: None,
        }
    }

    pub fn with_completion_tokens(mut self, tokens: u32) -> Self {
        self.completion_tokens = Some(tokens);
        self
    }
}

/// LLM completion capability.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError>;

    /// Provider/model name (for logging).
    fn name(&self) -> &str {
        "unknown"
    }
}
