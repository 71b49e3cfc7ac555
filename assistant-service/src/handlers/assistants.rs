use crate::dtos::assistants::{
    AssistantCreatedResponse, CreateAssistantRequest, UpdateAssistantStatusRequest,
};
use crate::middleware::user_id::UserId;
use crate::models::{AssistantKind, AssistantStatus, CreateAssistant, DeliveryMethod, TokenOperation};
use crate::services::ledger::DeductTokens;
use crate::services::pricing::{instruction_tokens, ASSISTANT_BASE_COST};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

/// GET /api/assistants - list the user's assistants.
pub async fn list_assistants(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let assistants = state.db.list_assistants(&user_id.0).await?;
    Ok(Json(assistants))
}

/// POST /api/assistants - create an assistant.
///
/// The instruction text plus the base cost is settled with the ledger
/// first; the assistant row only exists if the deduction committed.
pub async fn create_assistant(
    State(state): State<AppState>,
    user_id: UserId,
    Json(payload): Json<CreateAssistantRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let kind = AssistantKind::parse(&payload.kind)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown assistant kind: {}", payload.kind)))?;
    let delivery_method = DeliveryMethod::parse(&payload.delivery_method).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unknown delivery method: {}",
            payload.delivery_method
        ))
    })?;

    let instruction_cost = instruction_tokens(&payload.instructions, &payload.welcome_message);
    let total_cost = instruction_cost + ASSISTANT_BASE_COST;

    state
        .ledger
        .deduct(&DeductTokens {
            user_id: user_id.0.clone(),
            tokens: total_cost,
            operation: TokenOperation::CreateAssistant,
            assistant_id: None,
            description: Some(format!(
                "Created assistant: {} ({} instruction tokens + {} base cost)",
                payload.name, instruction_cost, ASSISTANT_BASE_COST
            )),
        })
        .await?;

    let assistant = state
        .db
        .create_assistant(&CreateAssistant {
            user_id: user_id.0,
            name: payload.name,
            kind,
            instructions: payload.instructions,
            welcome_message: payload.welcome_message,
            delivery_method,
            tone: payload.tone,
            response_length: payload.response_length,
            status: AssistantStatus::Active,
            tokens_used: instruction_cost,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AssistantCreatedResponse {
            success: true,
            assistant,
            tokens_used: total_cost,
        }),
    ))
}

/// GET /api/assistants/:id
pub async fn get_assistant(
    State(state): State<AppState>,
    user_id: UserId,
    Path(assistant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let assistant = state
        .db
        .get_assistant(&user_id.0, assistant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Assistant not found")))?;

    Ok(Json(assistant))
}

/// PUT /api/assistants/:id - update status.
pub async fn update_assistant_status(
    State(state): State<AppState>,
    user_id: UserId,
    Path(assistant_id): Path<Uuid>,
    Json(payload): Json<UpdateAssistantStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status = AssistantStatus::parse(&payload.status)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid status")))?;

    let assistant = state
        .db
        .update_assistant_status(&user_id.0, assistant_id, status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Assistant not found")))?;

    Ok(Json(json!({ "success": true, "assistant": assistant })))
}

/// DELETE /api/assistants/:id
pub async fn delete_assistant(
    State(state): State<AppState>,
    user_id: UserId,
    Path(assistant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.db.delete_assistant(&user_id.0, assistant_id).await?;

    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Assistant not found")));
    }

    Ok(Json(json!({ "success": true })))
}

/// POST /api/assistants/:id/duplicate - copy an assistant, priced like a
/// fresh creation over the source's instruction text.
pub async fn duplicate_assistant(
    State(state): State<AppState>,
    user_id: UserId,
    Path(assistant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let source = state
        .db
        .get_assistant(&user_id.0, assistant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Assistant not found")))?;

    let kind = source.parsed_kind().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!("Stored assistant has unknown kind"))
    })?;
    let delivery_method = DeliveryMethod::parse(&source.delivery_method).ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!("Stored assistant has unknown delivery method"))
    })?;

    let instruction_cost = instruction_tokens(&source.instructions, &source.welcome_message);
    let total_cost = instruction_cost + ASSISTANT_BASE_COST;

    state
        .ledger
        .deduct(&DeductTokens {
            user_id: user_id.0.clone(),
            tokens: total_cost,
            operation: TokenOperation::DuplicateAssistant,
            assistant_id: Some(source.assistant_id),
            description: Some(format!("Duplicated assistant: {}", source.name)),
        })
        .await?;

    let duplicate = state
        .db
        .create_assistant(&CreateAssistant {
            user_id: user_id.0,
            name: format!("{} (Copy)", source.name),
            kind,
            instructions: source.instructions,
            welcome_message: source.welcome_message,
            delivery_method,
            tone: source.tone,
            response_length: source.response_length,
            status: AssistantStatus::Draft,
            tokens_used: instruction_cost,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AssistantCreatedResponse {
            success: true,
            assistant: duplicate,
            tokens_used: total_cost,
        }),
    ))
}
