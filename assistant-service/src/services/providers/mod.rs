//! Chat completion providers.
//!
//! Trait-based abstraction over the LLM backend so the chat flow can run
//! against Gemini in production and a mock in tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Role of a prior turn in the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One prior turn handed to the provider as context.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// A completed generation and what it cost.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub text: String,

    /// Total tokens charged for the turn (prompt plus response), from the
    /// provider's own usage accounting where available.
    pub tokens_used: i64,
}

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate the assistant's reply to `message`, given the assistant's
    /// system prompt and the prior conversation.
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<ChatCompletion, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
