//! [`CompletionService`] over any OpenAI-compatible chat API.

use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAIClient, OpenAIError};
use std::time::Duration;
use tracing::debug;

use crate::error::{CompletionError, ConfigError};
use crate::secret::ApiKey;
use crate::traits::completion::{Completion, CompletionRequest, CompletionService};

/// Groq's OpenAI-compatible endpoint.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Chat completions through `openai-client`.
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    client: OpenAIClient,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(api_key: impl Into<ApiKey>, model: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            client: OpenAIClient::new(api_key.expose()),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        self.client = self
            .client
            .with_timeout(timeout)
            .map_err(|e| ConfigError::invalid("llm_timeout", e.to_string()))?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut chat = ChatRequest::new(&self.model);
        if let Some(system) = &request.system {
            chat = chat.message(Message::system(system));
        }
        chat = chat.message(Message::user(&request.prompt));
        if let Some(temperature) = request.temperature {
            chat = chat.temperature(temperature);
        }
        if let Some(tokens) = request.max_output_tokens {
            chat = chat.output_limit(tokens);
        }
        chat
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        debug!(
            model = %self.model,
            prompt_length = request.prompt.len(),
            "Calling completion API"
        );

        let response = self
            .client
            .chat_completion(self.chat_request(request))
            .await
            .map_err(completion_error)?;

        let mut completion = Completion::new(response.content);
        if let Some(usage) = response.usage {
            completion = completion.with_completion_tokens(usage.completion_tokens);
        }
        Ok(completion)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn completion_error(error: OpenAIError) -> CompletionError {
    match error {
        OpenAIError::RateLimited { retry_after } => CompletionError::RateLimited { retry_after },
        OpenAIError::ContentRejected(message) => CompletionError::ContentRejected(message),
        other => CompletionError::Service(other.to_string()),
    }
}
