//! Conversation and message models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Completed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One conversation between a visitor and an assistant. `user_id` is the
/// assistant owner, who pays for every AI turn; the visitor is identified
/// only by an optional email.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub assistant_id: Uuid,
    pub user_id: String,
    pub visitor_email: Option<String>,
    pub status: String,
    pub tokens_used: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Conversation {
    pub fn parsed_status(&self) -> Option<ConversationStatus> {
        ConversationStatus::parse(&self.status)
    }
}

/// One message in a conversation. `tokens` is zero for user messages and
/// for apology replies persisted when the owner's balance ran out.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub role: String,
    pub content: String,
    pub tokens: i64,
    pub created_utc: DateTime<Utc>,
}

impl Message {
    pub fn parsed_role(&self) -> Option<MessageRole> {
        MessageRole::parse(&self.role)
    }
}
