//! Gemini chat provider.
//!
//! Non-streaming text generation against Google's Gemini API. The system
//! prompt travels as the first user turn and assistant history maps to the
//! "model" role, mirroring the chat shape the API expects.

use super::{ChatCompletion, ChatProvider, ChatRole, ChatTurn, ProviderError};
use crate::services::metrics::PROVIDER_REQUESTS_TOTAL;
use crate::services::pricing::estimate_tokens;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Gemini API base URL.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

pub struct GeminiChatProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiChatProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            GEMINI_API_BASE, self.config.model, method, self.config.api_key
        )
    }

    fn build_contents(system_prompt: &str, history: &[ChatTurn], message: &str) -> Vec<Content> {
        let mut contents = Vec::with_capacity(history.len() + 2);
        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: system_prompt.to_string(),
            }],
        });
        for turn in history {
            contents.push(Content {
                role: Some(
                    match turn.role {
                        ChatRole::User => "user",
                        ChatRole::Assistant => "model",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: turn.content.clone(),
                }],
            });
        }
        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: message.to_string(),
            }],
        });
        contents
    }
}

#[async_trait]
impl ChatProvider for GeminiChatProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<ChatCompletion, ProviderError> {
        let contents = Self::build_contents(system_prompt, history, message);

        // Fallback accounting when the API omits usage metadata.
        let estimated_prompt_tokens: i64 = contents
            .iter()
            .flat_map(|c| c.parts.iter())
            .map(|p| estimate_tokens(&p.text))
            .sum();

        let request = GenerateContentRequest { contents };
        let url = self.api_url("generateContent");

        tracing::debug!(
            model = %self.config.model,
            history_len = history.len(),
            message_len = message.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                PROVIDER_REQUESTS_TOTAL
                    .with_label_values(&["gemini", "error"])
                    .inc();
                ProviderError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            PROVIDER_REQUESTS_TOTAL
                .with_label_values(&["gemini", "error"])
                .inc();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let candidate = api_response
            .candidates
            .first()
            .ok_or_else(|| ProviderError::ApiError("No candidates in response".to_string()))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            PROVIDER_REQUESTS_TOTAL
                .with_label_values(&["gemini", "filtered"])
                .inc();
            return Err(ProviderError::ContentFiltered);
        }

        let text = candidate
            .content
            .parts
            .first()
            .map(|p| p.text.clone())
            .ok_or_else(|| ProviderError::ApiError("Empty response content".to_string()))?;

        let tokens_used = match &api_response.usage_metadata {
            Some(usage) => {
                (usage.prompt_token_count.unwrap_or(0) + usage.candidates_token_count.unwrap_or(0))
                    as i64
            }
            None => estimated_prompt_tokens + estimate_tokens(&text),
        };

        PROVIDER_REQUESTS_TOTAL
            .with_label_values(&["gemini", "ok"])
            .inc();

        Ok(ChatCompletion { text, tokens_used })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        // Listing models verifies the API key works.
        let url = format!("{}/models?key={}", GEMINI_API_BASE, self.config.api_key);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
    #[allow(dead_code)]
    total_token_count: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contents_carry_system_prompt_history_and_message_in_order() {
        let history = vec![
            ChatTurn {
                role: ChatRole::User,
                content: "hi".to_string(),
            },
            ChatTurn {
                role: ChatRole::Assistant,
                content: "hello".to_string(),
            },
        ];

        let contents = GeminiChatProvider::build_contents("be helpful", &history, "question");
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[0].parts[0].text, "be helpful");
        assert_eq!(contents[1].role.as_deref(), Some("user"));
        assert_eq!(contents[2].role.as_deref(), Some("model"));
        assert_eq!(contents[3].parts[0].text, "question");
    }
}
