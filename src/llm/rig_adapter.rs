//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.
//!
//! rig owns the HTTP transport and the chat completions wire format; this
//! adapter only translates requests, responses and errors.

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionError, CompletionModel, Message};

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Upper bound on one completion round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M> RigAdapter<M>
where
    M: CompletionModel,
{
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }

    fn map_error(&self, err: CompletionError) -> LlmError {
        let provider = self.provider.to_string();
        match err {
            CompletionError::JsonError(e) => LlmError::Json(e),
            CompletionError::ResponseError(reason) => {
                match classify_failure(provider, reason) {
                    LlmError::RequestFailed { provider, reason } => {
                        LlmError::InvalidResponse { provider, reason }
                    }
                    classified => classified,
                }
            }
            other => classify_failure(provider, other.to_string()),
        }
    }
}

/// Sort a transport or provider error by what the API said.
///
/// rig surfaces non-2xx bodies as text, so rate limiting and auth failures
/// are recognised from the status or the OpenAI-style error code in it.
fn classify_failure(provider: String, reason: String) -> LlmError {
    let lower = reason.to_ascii_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit") {
        LlmError::RateLimited {
            provider,
            retry_after: None,
        }
    } else if lower.contains("401")
        || lower.contains("403")
        || lower.contains("invalid_api_key")
        || lower.contains("invalid api key")
        || lower.contains("unauthorized")
    {
        LlmError::AuthFailed { provider }
    } else {
        LlmError::RequestFailed { provider, reason }
    }
}

fn saturating_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut preamble = Vec::new();
        let mut turns = Vec::new();
        for message in request.messages {
            match message.role {
                Role::System => preamble.push(message.content),
                Role::User => turns.push(message.content),
            }
        }
        let prompt = turns.pop().ok_or_else(|| LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason: "request has no user turn".into(),
        })?;

        let mut builder = self
            .model
            .completion_request(Message::user(prompt))
            .messages(turns.into_iter().map(Message::user).collect());
        if !preamble.is_empty() {
            builder = builder.preamble(preamble.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = tokio::time::timeout(REQUEST_TIMEOUT, builder.send())
            .await
            .map_err(|_| LlmError::RequestFailed {
                provider: self.provider.to_string(),
                reason: format!("no response within {}s", REQUEST_TIMEOUT.as_secs()),
            })?
            .map_err(|e| self.map_error(e))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");
        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: "empty completion".into(),
            });
        }

        Ok(CompletionResponse {
            content,
            input_tokens: saturating_u32(response.usage.input_tokens),
            output_tokens: saturating_u32(response.usage.output_tokens),
        })
    }
}
