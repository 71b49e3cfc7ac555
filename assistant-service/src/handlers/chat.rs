use crate::dtos::conversations::{
    AssistantCardResponse, ConversationStartedResponse, StartConversationRequest,
};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

/// GET /api/chat/:assistant_id - public assistant card for the widget.
pub async fn assistant_card(
    State(state): State<AppState>,
    Path(assistant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let assistant = state
        .db
        .find_assistant(assistant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Assistant not found")))?;

    Ok(Json(AssistantCardResponse {
        assistant_id: assistant.assistant_id,
        name: assistant.name,
        kind: assistant.kind,
        welcome_message: assistant.welcome_message,
        status: assistant.status,
    }))
}

/// POST /api/chat/:assistant_id - start a conversation with an active
/// assistant. Turns then flow through the conversation message endpoint.
pub async fn start_conversation(
    State(state): State<AppState>,
    Path(assistant_id): Path<Uuid>,
    Json(payload): Json<StartConversationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let assistant = state
        .db
        .find_assistant(assistant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Assistant not found")))?;

    if !assistant.is_active() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Assistant is not accepting conversations"
        )));
    }

    let conversation = state
        .db
        .create_conversation(&assistant, payload.visitor_email.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ConversationStartedResponse {
            conversation_id: conversation.conversation_id,
            assistant_name: assistant.name,
            welcome_message: assistant.welcome_message,
        }),
    ))
}
