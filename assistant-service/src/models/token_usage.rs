//! Token ledger entry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Balance-affecting operations recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenOperation {
    CreateAssistant,
    DuplicateAssistant,
    ChatMessage,
    PlanUpgrade,
    TokenPurchase,
    WelcomeBonus,
}

impl TokenOperation {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAssistant => "create_assistant",
            Self::DuplicateAssistant => "duplicate_assistant",
            Self::ChatMessage => "chat_message",
            Self::PlanUpgrade => "plan_upgrade",
            Self::TokenPurchase => "token_purchase",
            Self::WelcomeBonus => "welcome_bonus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create_assistant" => Some(Self::CreateAssistant),
            "duplicate_assistant" => Some(Self::DuplicateAssistant),
            "chat_message" => Some(Self::ChatMessage),
            "plan_upgrade" => Some(Self::PlanUpgrade),
            "token_purchase" => Some(Self::TokenPurchase),
            "welcome_bonus" => Some(Self::WelcomeBonus),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable ledger row. Positive amounts are consumption,
/// negative amounts are credits; rows are never updated or deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TokenUsage {
    pub usage_id: Uuid,
    pub user_id: String,
    pub assistant_id: Option<Uuid>,
    pub operation: String,
    pub tokens: i64,
    pub description: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl TokenUsage {
    /// Get parsed operation tag.
    pub fn parsed_operation(&self) -> Option<TokenOperation> {
        TokenOperation::parse(&self.operation)
    }

    pub fn is_credit(&self) -> bool {
        self.tokens < 0
    }
}
