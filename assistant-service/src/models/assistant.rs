//! Assistant model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What an assistant is built to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantKind {
    Sales,
    Feedback,
    Survey,
}

impl AssistantKind {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Feedback => "feedback",
            Self::Survey => "survey",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sales" => Some(Self::Sales),
            "feedback" => Some(Self::Feedback),
            "survey" => Some(Self::Survey),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssistantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the assistant is surfaced to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Widget,
    Link,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Widget => "widget",
            Self::Link => "link",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "widget" => Some(Self::Widget),
            "link" => Some(Self::Link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantStatus {
    Draft,
    Active,
    Paused,
}

impl AssistantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssistantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configured assistant. `tokens_used` and `interactions` are cumulative
/// counters maintained by the chat flow.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Assistant {
    pub assistant_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub kind: String,
    pub instructions: String,
    pub welcome_message: String,
    pub delivery_method: String,
    pub tone: String,
    pub response_length: String,
    pub status: String,
    pub tokens_used: i64,
    pub interactions: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Assistant {
    /// Get parsed kind.
    pub fn parsed_kind(&self) -> Option<AssistantKind> {
        AssistantKind::parse(&self.kind)
    }

    /// Get parsed status.
    pub fn parsed_status(&self) -> Option<AssistantStatus> {
        AssistantStatus::parse(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.parsed_status() == Some(AssistantStatus::Active)
    }
}

/// Input for persisting a new assistant.
#[derive(Debug, Clone)]
pub struct CreateAssistant {
    pub user_id: String,
    pub name: String,
    pub kind: AssistantKind,
    pub instructions: String,
    pub welcome_message: String,
    pub delivery_method: DeliveryMethod,
    pub tone: String,
    pub response_length: String,
    pub status: AssistantStatus,
    pub tokens_used: i64,
}
