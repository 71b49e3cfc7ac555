use crate::models::Assistant;
use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_tone() -> String {
    "professional".to_string()
}

fn default_response_length() -> String {
    "medium".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssistantRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    /// One of `sales | feedback | survey`.
    #[validate(length(min = 1))]
    pub kind: String,
    #[validate(length(min = 1, max = 8192))]
    pub instructions: String,
    #[validate(length(min = 1, max = 2048))]
    pub welcome_message: String,
    /// One of `widget | link`.
    #[validate(length(min = 1))]
    pub delivery_method: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_response_length")]
    pub response_length: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssistantStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct AssistantCreatedResponse {
    pub success: bool,
    pub assistant: Assistant,
    pub tokens_used: i64,
}
