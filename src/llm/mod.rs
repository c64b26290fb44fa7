//! LLM integration.
//!
//! Uses the rig-core crate for HTTP transport against Groq's OpenAI-style
//! chat completions endpoint, and `RigAdapter` to bridge rig's
//! `CompletionModel` trait to our `LlmProvider` trait. `ResponseGenerator`
//! wraps a provider with the banking prompt and the fallback reply.

pub mod provider;
pub mod responder;
mod rig_adapter;

pub use provider::*;
pub use responder::{GeneratedReply, ReplySource, ResponseGenerator};
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Configuration for the completion API.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL up to, not including, `/chat/completions`.
    pub base_url: String,
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Create the LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::groq;

    let client: groq::Client = groq::Client::builder()
        .api_key(config.api_key.expose_secret())
        .base_url(config.base_url.trim_end_matches('/'))
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: "groq".to_string(),
            reason: format!("Failed to create Groq client: {}", e),
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using {} (model: {})", config.base_url, config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model, "groq")))
}
