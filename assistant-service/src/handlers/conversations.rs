use crate::dtos::conversations::{
    ConversationDetailResponse, MessageView, ResponseOverview, ResponseStatsResponse,
    SendMessageRequest, SendMessageResponse, UpdateConversationStatusRequest,
};
use crate::middleware::user_id::UserId;
use crate::models::ConversationStatus;
use crate::services::chat::{self, TurnOutcome};
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

/// GET /api/conversations/responses - all conversations with summaries.
pub async fn list_responses(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let overviews = state.db.conversation_overviews(&user_id.0).await?;

    let mut responses = Vec::with_capacity(overviews.len());
    for overview in overviews {
        let messages = state.db.list_messages(overview.conversation_id).await?;

        responses.push(ResponseOverview {
            conversation_id: overview.conversation_id,
            assistant: overview.assistant_name,
            kind: overview.assistant_kind,
            visitor: overview
                .visitor_email
                .unwrap_or_else(|| "Anonymous".to_string()),
            status: overview.status,
            created_utc: overview.created_utc,
            message_count: messages.len(),
            tokens_used: overview.tokens_used,
            summary: chat::summarize(&messages),
            full_conversation: messages
                .into_iter()
                .map(|m| MessageView {
                    role: m.role,
                    content: m.content,
                    tokens: m.tokens,
                })
                .collect(),
        });
    }

    Ok(Json(responses))
}

/// GET /api/conversations/responses/stats
pub async fn response_stats(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let totals = state.db.response_totals(&user_id.0).await?;

    let completion_rate = if totals.total_conversations > 0 {
        ((totals.completed_conversations as f64 / totals.total_conversations as f64) * 100.0)
            .round() as i64
    } else {
        0
    };
    let avg_messages = if totals.total_conversations > 0 {
        (totals.total_messages as f64 / totals.total_conversations as f64).round() as i64
    } else {
        0
    };

    Ok(Json(ResponseStatsResponse {
        total_responses: totals.total_conversations,
        completion_rate,
        avg_messages,
        unique_visitors: totals.unique_visitors,
        total_tokens_used: totals.total_tokens_used,
    }))
}

/// GET /api/conversations/:id - conversation with messages, owner only.
pub async fn get_conversation(
    State(state): State<AppState>,
    user_id: UserId,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let conversation = state
        .db
        .get_conversation(conversation_id)
        .await?
        .filter(|c| c.user_id == user_id.0)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Conversation not found")))?;

    let messages = state.db.list_messages(conversation_id).await?;

    Ok(Json(ConversationDetailResponse {
        conversation,
        messages,
    }))
}

/// PUT /api/conversations/:id - update status, owner only.
pub async fn update_status(
    State(state): State<AppState>,
    user_id: UserId,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<UpdateConversationStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status = ConversationStatus::parse(&payload.status)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid status")))?;

    let conversation = state
        .db
        .update_conversation_status(&user_id.0, conversation_id, status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Conversation not found")))?;

    Ok(Json(json!({ "success": true, "conversation": conversation })))
}

/// POST /api/conversations/:id/message - run one chat turn.
///
/// Open to widget visitors: the conversation itself carries the paying
/// owner, so no caller identity is required here.
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let conversation = state
        .db
        .get_conversation(conversation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Conversation not found")))?;

    let outcome = chat::run_turn(
        &state.db,
        &state.ledger,
        state.provider.as_ref(),
        &conversation,
        &payload.user_message,
    )
    .await?;

    match outcome {
        TurnOutcome::Answered {
            message,
            tokens_used,
        } => Ok((
            StatusCode::OK,
            Json(SendMessageResponse {
                success: true,
                error: None,
                message,
                tokens_used,
            }),
        )),
        TurnOutcome::OutOfTokens { message } => Ok((
            StatusCode::BAD_REQUEST,
            Json(SendMessageResponse {
                success: false,
                error: Some("Insufficient tokens".to_string()),
                message,
                tokens_used: 0,
            }),
        )),
    }
}
