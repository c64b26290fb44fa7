//! Error types for bank-mail-assist.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read {path}: {source}")]
    PromptFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Inbound mailbox (IMAP) errors.
///
/// The variant decides what the pipeline does: `Connect` and `Query` abort the
/// cycle, `Parse` skips one message, `Flag` leaves the message unread.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("Mailbox query failed: {0}")]
    Query(String),

    #[error("Failed to fetch or parse message {handle}: {reason}")]
    Parse { handle: String, reason: String },

    #[error("Failed to update flags on message {handle}: {reason}")]
    Flag { handle: String, reason: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outbound mail (SMTP) errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Compose(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),

    #[error("Delivery task failed: {0}")]
    Task(String),
}

/// Pipeline-level errors that end a whole cycle.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Cycle aborted: {0}")]
    Aborted(#[from] MailboxError),

    #[error("Cycle panicked: {0}")]
    Panicked(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
