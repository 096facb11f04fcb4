//! Chat-completion client for OpenAI-compatible providers.
//!
//! Candidate models are tried strictly in order until one answers with a
//! 2xx; the answer is handed back over a content channel and failures over
//! an error channel (see [`Completion`]).

mod client;
mod sse;

use serde::{Deserialize, Serialize};

pub use client::{Completion, LlmClient};

/// Hard upper bound on `max_tokens` sent to any provider.
pub const MAX_TOKENS_CAP: u32 = 4000;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Azure,
    #[default]
    OpenRouter,
}

impl Provider {
    /// Secret holding the provider's API key.
    pub fn api_key_secret(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Azure => "AZURE_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(
        role: &str,
        content: &str,
    ) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// candidate models in fallback order
    pub models: Vec<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub stream: bool,
    /// capped at [`MAX_TOKENS_CAP`] when sent
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(
        models: Vec<String>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            models,
            messages,
            temperature: 0.0,
            stream: false,
            max_tokens: MAX_TOKENS_CAP,
        }
    }
}
