//! Response generator: turns a customer query into reply text.
//!
//! Never fails: any provider error is replaced by [`FALLBACK_REPLY`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::LlmConfig;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::prompts::FALLBACK_REPLY;

/// Where a reply's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Model,
    Fallback,
}

/// Reply text for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    pub source: ReplySource,
}

impl GeneratedReply {
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_REPLY.to_string(),
            source: ReplySource::Fallback,
        }
    }
}

/// Stateless: every call sends the same system prompt plus one user turn.
pub struct ResponseGenerator {
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

impl ResponseGenerator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        system_prompt: impl Into<String>,
        config: &LlmConfig,
    ) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Generate a reply, substituting the fallback text on any error.
    pub async fn generate(&self, query: &str) -> GeneratedReply {
        match self.try_generate(query).await {
            Ok(text) => GeneratedReply {
                text,
                source: ReplySource::Model,
            },
            Err(e) => {
                warn!(
                    model = %self.llm.model_name(),
                    error = %e,
                    "Reply generation failed, using fallback"
                );
                GeneratedReply::fallback()
            }
        }
    }

    /// One completion call; errors are returned as-is.
    pub async fn try_generate(&self, query: &str) -> Result<String, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(query),
        ])
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self.llm.complete(request).await?;
        debug!(
            model = %self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Reply generated"
        );
        if response.output_tokens >= self.max_tokens {
            warn!(
                max_tokens = self.max_tokens,
                "Reply hit the token limit and may be cut off"
            );
        }
        Ok(response.content.trim().to_string())
    }
}
