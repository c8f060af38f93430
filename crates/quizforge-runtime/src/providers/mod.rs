//! Model provider abstractions.
//!
//! A provider answers two kinds of request: a chat completion constrained
//! to a JSON Schema, and a batch of text embeddings. The generator,
//! verifier and embedder are all reached through this trait.
//!
//! ## Security
//!
//! Providers hold their key as an [`ApiCredential`], which never shows up
//! in `Debug` or `Display` output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod secrets;

#[cfg(feature = "openai")]
mod openai;

pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "openai")]
pub use openai::OpenAiProvider;

use crate::resilience::RetryableError;

/// Errors from model providers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Map a non-2xx response onto an error, pulling out the API's message.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "no response body".to_string()
                } else {
                    trimmed.chars().take(300).collect()
                }
            });
        ProviderError::Status { status, message }
    }
}

impl RetryableError for ProviderError {
    /// Rate limiting and temporary unavailability are worth retrying.
    fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Status { status: 429 | 503, .. })
    }
}

/// A chat message for completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A completion whose reply must match `schema`.
#[derive(Debug, Clone)]
pub struct JsonCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Name the schema is registered under in the request
    pub schema_name: &'static str,
    pub schema: serde_json::Value,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Raw reply text from a completion.
#[derive(Debug, Clone)]
pub struct JsonCompletion {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub model: String,
    pub inputs: Vec<String>,
}

/// One vector per input, in input order.
#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub vectors: Vec<Vec<f32>>,
    pub usage: TokenUsage,
    pub model: String,
}

/// Token usage from one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping model backends.
///
/// The gateway is the only caller; everything else goes through it.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Chat completion constrained to a JSON Schema.
    async fn complete_json(
        &self,
        request: &JsonCompletionRequest,
    ) -> Result<JsonCompletion, ProviderError>;

    /// Embed each input text.
    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError>;

    /// Check if provider is usable.
    async fn health_check(&self) -> bool;

    /// Provider name for logs.
    fn name(&self) -> &str;
}
