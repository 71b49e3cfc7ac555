use crate::models::{Conversation, Message};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct StartConversationRequest {
    #[validate(email)]
    pub visitor_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationStartedResponse {
    pub conversation_id: Uuid,
    pub assistant_name: String,
    pub welcome_message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 8192))]
    pub user_message: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: Message,
    pub tokens_used: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConversationStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetailResponse {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Public assistant card for the widget surface.
#[derive(Debug, Serialize)]
pub struct AssistantCardResponse {
    pub assistant_id: Uuid,
    pub name: String,
    pub kind: String,
    pub welcome_message: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub role: String,
    pub content: String,
    pub tokens: i64,
}

/// One conversation as shown on the responses dashboard.
#[derive(Debug, Serialize)]
pub struct ResponseOverview {
    pub conversation_id: Uuid,
    pub assistant: String,
    pub kind: String,
    pub visitor: String,
    pub status: String,
    pub created_utc: DateTime<Utc>,
    pub message_count: usize,
    pub tokens_used: i64,
    pub summary: String,
    pub full_conversation: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct ResponseStatsResponse {
    pub total_responses: i64,
    pub completion_rate: i64,
    pub avg_messages: i64,
    pub unique_visitors: i64,
    pub total_tokens_used: i64,
}
