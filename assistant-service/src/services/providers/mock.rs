//! Mock provider implementation for testing.

use super::{ChatCompletion, ChatProvider, ChatTurn, ProviderError};
use crate::services::pricing::estimate_tokens;
use async_trait::async_trait;

/// Deterministic cost of a mock reply, on top of the estimated message cost.
pub const MOCK_REPLY_TOKENS: i64 = 10;

/// Mock chat provider. Replies echo the message; the reported cost is the
/// message estimate plus [`MOCK_REPLY_TOKENS`], so callers can predict it.
pub struct MockChatProvider {
    enabled: bool,
}

impl MockChatProvider {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn generate(
        &self,
        _system_prompt: &str,
        _history: &[ChatTurn],
        message: &str,
    ) -> Result<ChatCompletion, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotConfigured(
                "Mock chat provider not enabled".to_string(),
            ));
        }

        Ok(ChatCompletion {
            text: format!("Mock response for: {}", message),
            tokens_used: estimate_tokens(message) + MOCK_REPLY_TOKENS,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(
                "Mock chat provider not enabled".to_string(),
            ))
        }
    }
}
