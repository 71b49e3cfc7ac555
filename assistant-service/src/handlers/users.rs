use crate::dtos::users::{
    DashboardStatsResponse, DeductTokensRequest, ProvisionUserRequest, PurchaseTokensRequest,
    TokenBalanceResponse, UpdatePlanRequest, UsageResponse,
};
use crate::middleware::user_id::UserId;
use crate::models::{Plan, TokenOperation};
use crate::services::ledger::DeductTokens;
use crate::services::WELCOME_BONUS_TOKENS;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;
use validator::Validate;

const HISTORY_LIMIT: i64 = 50;

/// GET /api/user - current user record.
pub async fn get_user(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .get_user(&user_id.0)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(user))
}

/// POST /api/user - provision the authenticated user.
///
/// Idempotent: an already provisioned user is returned unchanged. A new
/// user starts on the starter plan with the welcome grant recorded in the
/// ledger.
pub async fn provision_user(
    State(state): State<AppState>,
    user_id: UserId,
    Json(payload): Json<ProvisionUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    match state
        .db
        .create_user(&user_id.0, &payload.email, &payload.name)
        .await?
    {
        Some(_) => {
            state
                .ledger
                .credit(
                    &user_id.0,
                    WELCOME_BONUS_TOKENS,
                    TokenOperation::WelcomeBonus,
                    "Welcome bonus for new user - 5000 tokens to get started!",
                )
                .await?;

            let user = state.db.get_user(&user_id.0).await?.ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!("Provisioned user disappeared"))
            })?;

            tracing::info!(
                name = %user.name,
                tokens = user.tokens,
                "New user provisioned with welcome tokens"
            );

            Ok((StatusCode::CREATED, Json(user)))
        }
        None => {
            let user = state
                .db
                .get_user(&user_id.0)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

            Ok((StatusCode::OK, Json(user)))
        }
    }
}

/// GET /api/user/tokens - balance and plan.
pub async fn get_tokens(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .get_user(&user_id.0)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(TokenBalanceResponse {
        tokens: user.tokens,
        plan: user.plan,
    }))
}

/// POST /api/user/tokens - deduct tokens.
pub async fn deduct_tokens(
    State(state): State<AppState>,
    user_id: UserId,
    Json(payload): Json<DeductTokensRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let operation = TokenOperation::parse(&payload.operation).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Unknown operation: {}", payload.operation))
    })?;

    state
        .ledger
        .deduct(&DeductTokens {
            user_id: user_id.0,
            tokens: payload.tokens,
            operation,
            assistant_id: payload.assistant_id,
            description: payload.description,
        })
        .await?;

    Ok(Json(json!({ "success": true })))
}

/// PUT /api/user/tokens - purchase tokens.
pub async fn purchase_tokens(
    State(state): State<AppState>,
    user_id: UserId,
    Json(payload): Json<PurchaseTokensRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    state
        .ledger
        .credit(
            &user_id.0,
            payload.tokens,
            TokenOperation::TokenPurchase,
            &payload.reason,
        )
        .await?;

    Ok(Json(json!({ "success": true })))
}

/// PUT /api/user/plan - switch plan, resetting the balance to the plan
/// allotment.
pub async fn update_plan(
    State(state): State<AppState>,
    user_id: UserId,
    Json(payload): Json<UpdatePlanRequest>,
) -> Result<impl IntoResponse, AppError> {
    let plan = Plan::parse(&payload.new_plan)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid plan")))?;

    state.ledger.set_plan(&user_id.0, plan).await?;

    Ok(Json(json!({ "success": true })))
}

/// GET /api/user/token-history - latest ledger entries, newest first.
pub async fn token_history(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.ledger.history(&user_id.0, HISTORY_LIMIT).await?;
    Ok(Json(entries))
}

/// GET /api/user/usage - plan limits and utilisation.
pub async fn usage_report(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .get_user(&user_id.0)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    let assistant_count = state.db.assistant_count(&user_id.0).await?;
    let total_interactions = state.db.total_interactions(&user_id.0).await?;
    let consumed = state.ledger.total_consumed(&user_id.0).await?;

    Ok(Json(UsageResponse::build(
        user.parsed_plan(),
        assistant_count,
        total_interactions,
        user.tokens,
        consumed,
    )))
}

/// GET /api/user/dashboard/stats - headline numbers for the dashboard.
pub async fn dashboard_stats(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .get_user(&user_id.0)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    let assistant_count = state.db.assistant_count(&user_id.0).await?;
    let total_interactions = state.db.total_interactions(&user_id.0).await?;

    Ok(Json(DashboardStatsResponse {
        assistant_count,
        total_interactions,
        tokens: user.tokens,
    }))
}
