//! Token ledger and metering.
//!
//! The single authority for mutating a user's token balance. Every balance
//! change commits together with an append-only `token_usage` row in one
//! transaction; no other code path writes to either table.

use crate::models::{Plan, TokenOperation, TokenUsage};
use crate::services::metrics::{DB_QUERY_DURATION, LEDGER_TRANSACTIONS_TOTAL};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

/// Balance granted to a freshly provisioned user.
pub const WELCOME_BONUS_TOKENS: i64 = 5_000;

/// Outcomes of a ledger operation that callers must branch on.
/// `MissingFields` and `InsufficientTokens` are business results, not
/// system faults; `Storage` is.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Insufficient tokens")]
    InsufficientTokens,

    #[error("User not found")]
    UnknownUser,

    #[error("Ledger storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::MissingFields | LedgerError::InsufficientTokens => {
                AppError::BadRequest(anyhow::anyhow!("{}", err))
            }
            LedgerError::UnknownUser => AppError::NotFound(anyhow::anyhow!("{}", err)),
            LedgerError::Storage(e) => {
                AppError::DatabaseError(anyhow::anyhow!("Ledger storage error: {}", e))
            }
        }
    }
}

/// Input for a deduction.
#[derive(Debug, Clone)]
pub struct DeductTokens {
    pub user_id: String,
    pub tokens: i64,
    pub operation: TokenOperation,
    pub assistant_id: Option<Uuid>,
    pub description: Option<String>,
}

/// Ledger over the shared connection pool.
#[derive(Clone)]
pub struct TokenLedger {
    pool: PgPool,
}

impl TokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deduct tokens from a user's balance and append the usage row.
    ///
    /// The sufficiency check is part of the UPDATE itself (`tokens >= $n`
    /// in the WHERE clause), so two concurrent deductions can never both
    /// pass it against a balance that only covers one of them. A user that
    /// does not exist deducts like an empty balance.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, operation = %input.operation, tokens = input.tokens))]
    pub async fn deduct(&self, input: &DeductTokens) -> Result<(), LedgerError> {
        if input.tokens <= 0 {
            return Err(LedgerError::MissingFields);
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["deduct_tokens"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET tokens = tokens - $2, updated_utc = now()
            WHERE user_id = $1 AND tokens >= $2
            "#,
        )
        .bind(&input.user_id)
        .bind(input.tokens)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.ok();
            LEDGER_TRANSACTIONS_TOTAL
                .with_label_values(&["deduct", "insufficient"])
                .inc();
            return Err(LedgerError::InsufficientTokens);
        }

        sqlx::query(
            r#"
            INSERT INTO token_usage (usage_id, user_id, assistant_id, operation, tokens, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.user_id)
        .bind(input.assistant_id)
        .bind(input.operation.as_str())
        .bind(input.tokens)
        .bind(&input.description)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        LEDGER_TRANSACTIONS_TOTAL
            .with_label_values(&["deduct", "ok"])
            .inc();

        info!(
            tokens = input.tokens,
            operation = %input.operation,
            "Tokens deducted"
        );

        Ok(())
    }

    /// Credit tokens to a user's balance. The ledger row records the
    /// negation of the amount: negative entries denote credits.
    #[instrument(skip(self, reason), fields(user_id = %user_id, operation = %operation, tokens = tokens))]
    pub async fn credit(
        &self,
        user_id: &str,
        tokens: i64,
        operation: TokenOperation,
        reason: &str,
    ) -> Result<(), LedgerError> {
        if tokens <= 0 {
            return Err(LedgerError::MissingFields);
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["credit_tokens"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET tokens = tokens + $2, updated_utc = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(tokens)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.ok();
            LEDGER_TRANSACTIONS_TOTAL
                .with_label_values(&["credit", "unknown_user"])
                .inc();
            return Err(LedgerError::UnknownUser);
        }

        sqlx::query(
            r#"
            INSERT INTO token_usage (usage_id, user_id, operation, tokens, description)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(operation.as_str())
        .bind(-tokens)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        LEDGER_TRANSACTIONS_TOTAL
            .with_label_values(&["credit", "ok"])
            .inc();

        info!(tokens = tokens, operation = %operation, "Tokens credited");

        Ok(())
    }

    /// Switch a user to a plan and reset the balance to its allotment.
    /// This discards any unspent balance; the ledger row records the full
    /// allotment as a credit.
    #[instrument(skip(self), fields(user_id = %user_id, plan = %plan))]
    pub async fn set_plan(&self, user_id: &str, plan: Plan) -> Result<(), LedgerError> {
        let allotment = plan.token_allotment();

        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_plan"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET plan = $2, tokens = $3, updated_utc = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(plan.as_str())
        .bind(allotment)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.ok();
            LEDGER_TRANSACTIONS_TOTAL
                .with_label_values(&["set_plan", "unknown_user"])
                .inc();
            return Err(LedgerError::UnknownUser);
        }

        sqlx::query(
            r#"
            INSERT INTO token_usage (usage_id, user_id, operation, tokens, description)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(TokenOperation::PlanUpgrade.as_str())
        .bind(-allotment)
        .bind(format!("Upgraded to {} plan", plan))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        LEDGER_TRANSACTIONS_TOTAL
            .with_label_values(&["set_plan", "ok"])
            .inc();

        info!(plan = %plan, allotment = allotment, "Plan changed, balance reset");

        Ok(())
    }

    /// Current balance, or None for an unknown user.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn balance(&self, user_id: &str) -> Result<Option<i64>, LedgerError> {
        let tokens = sqlx::query_scalar::<_, i64>("SELECT tokens FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tokens)
    }

    /// Latest ledger entries for a user, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn history(&self, user_id: &str, limit: i64) -> Result<Vec<TokenUsage>, LedgerError> {
        let entries = sqlx::query_as::<_, TokenUsage>(
            r#"
            SELECT usage_id, user_id, assistant_id, operation, tokens, description, created_utc
            FROM token_usage
            WHERE user_id = $1
            ORDER BY created_utc DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Total consumption: the sum of positive ledger amounts only.
    /// Credits do not offset it.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn total_consumed(&self, user_id: &str) -> Result<i64, LedgerError> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(tokens), 0)::BIGINT
            FROM token_usage
            WHERE user_id = $1 AND tokens > 0
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
