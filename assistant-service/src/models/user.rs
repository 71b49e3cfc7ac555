//! User account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Subscription plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Starter,
    Pro,
    Enterprise,
}

/// Per-plan usage ceilings. A limit of -1 means unlimited.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlanLimits {
    pub assistants: i64,
    pub interactions: i64,
    pub team_members: i64,
    pub monthly_tokens: i64,
}

impl Plan {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "starter" => Some(Self::Starter),
            "pro" => Some(Self::Pro),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    /// Token balance a user holds right after switching to this plan.
    /// Plan changes reset the balance to this value; they do not top up.
    pub fn token_allotment(&self) -> i64 {
        match self {
            Self::Starter => 5_000,
            Self::Pro => 25_000,
            Self::Enterprise => 100_000,
        }
    }

    pub fn limits(&self) -> PlanLimits {
        match self {
            Self::Starter => PlanLimits {
                assistants: 5,
                interactions: 1_000,
                team_members: 1,
                monthly_tokens: 5_000,
            },
            Self::Pro => PlanLimits {
                assistants: 25,
                interactions: 10_000,
                team_members: 10,
                monthly_tokens: 25_000,
            },
            Self::Enterprise => PlanLimits {
                assistants: -1,
                interactions: -1,
                team_members: -1,
                monthly_tokens: 100_000,
            },
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform user. The id is issued by the external identity provider;
/// the balance column is mutated only through the token ledger.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub plan: String,
    pub tokens: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Get parsed plan, defaulting to starter for unrecognized values.
    pub fn parsed_plan(&self) -> Plan {
        Plan::parse(&self.plan).unwrap_or(Plan::Starter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_round_trips_through_str() {
        for plan in [Plan::Starter, Plan::Pro, Plan::Enterprise] {
            assert_eq!(Plan::parse(plan.as_str()), Some(plan));
        }
        assert_eq!(Plan::parse("platinum"), None);
    }

    #[test]
    fn plan_allotments() {
        assert_eq!(Plan::Starter.token_allotment(), 5_000);
        assert_eq!(Plan::Pro.token_allotment(), 25_000);
        assert_eq!(Plan::Enterprise.token_allotment(), 100_000);
    }

    #[test]
    fn enterprise_limits_are_unlimited_except_tokens() {
        let limits = Plan::Enterprise.limits();
        assert_eq!(limits.assistants, -1);
        assert_eq!(limits.interactions, -1);
        assert_eq!(limits.monthly_tokens, 100_000);
    }
}
