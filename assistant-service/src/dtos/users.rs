use crate::models::PlanLimits;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ProvisionUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub name: String,
}

/// Direct deduction request. The operation arrives as a free-form tag and
/// is parsed against the known ledger operations before anything is
/// touched.
#[derive(Debug, Deserialize, Validate)]
pub struct DeductTokensRequest {
    #[validate(range(min = 1))]
    pub tokens: i64,
    #[validate(length(min = 1, max = 32))]
    pub operation: String,
    pub assistant_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PurchaseTokensRequest {
    #[validate(range(min = 1))]
    pub tokens: i64,
    #[validate(length(min = 1, max = 256))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanRequest {
    pub new_plan: String,
}

#[derive(Debug, Serialize)]
pub struct TokenBalanceResponse {
    pub tokens: i64,
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardStatsResponse {
    pub assistant_count: i64,
    pub total_interactions: i64,
    pub tokens: i64,
}

/// Utilisation of one plan-limited resource. A limit of -1 means
/// unlimited, reported as 0% used.
#[derive(Debug, Serialize)]
pub struct UsageGauge {
    pub current: i64,
    pub limit: i64,
    pub percentage: i64,
}

impl UsageGauge {
    pub fn new(current: i64, limit: i64) -> Self {
        let percentage = if limit <= 0 {
            0
        } else {
            ((current as f64 / limit as f64) * 100.0).round() as i64
        };
        Self {
            current,
            limit,
            percentage,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenGauge {
    pub current: i64,
    pub used: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub assistants: UsageGauge,
    pub interactions: UsageGauge,
    pub team_members: UsageGauge,
    pub tokens: TokenGauge,
    pub plan: String,
}

impl UsageResponse {
    pub fn build(
        plan: crate::models::Plan,
        assistant_count: i64,
        total_interactions: i64,
        balance: i64,
        consumed: i64,
    ) -> Self {
        let PlanLimits {
            assistants,
            interactions,
            team_members,
            monthly_tokens,
        } = plan.limits();

        Self {
            assistants: UsageGauge::new(assistant_count, assistants),
            interactions: UsageGauge::new(total_interactions, interactions),
            team_members: UsageGauge::new(1, team_members),
            tokens: TokenGauge {
                current: balance,
                used: consumed,
                limit: monthly_tokens,
            },
            plan: plan.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Plan;

    #[test]
    fn gauge_percentage_rounds() {
        let gauge = UsageGauge::new(1, 3);
        assert_eq!(gauge.percentage, 33);

        let gauge = UsageGauge::new(2, 3);
        assert_eq!(gauge.percentage, 67);
    }

    #[test]
    fn unlimited_gauge_reports_zero_percent() {
        let gauge = UsageGauge::new(1_000, -1);
        assert_eq!(gauge.percentage, 0);
        assert_eq!(gauge.limit, -1);
    }

    #[test]
    fn usage_response_uses_plan_limits() {
        let usage = UsageResponse::build(Plan::Starter, 2, 500, 4_000, 1_000);
        assert_eq!(usage.assistants.limit, 5);
        assert_eq!(usage.assistants.percentage, 40);
        assert_eq!(usage.interactions.percentage, 50);
        assert_eq!(usage.tokens.limit, 5_000);
        assert_eq!(usage.plan, "starter");
    }
}
