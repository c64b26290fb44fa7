//! Bank Mail Assist: answers customer banking questions by email.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompts;
