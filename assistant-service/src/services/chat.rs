//! Chat turn orchestration.
//!
//! One turn: persist the visitor's message, generate a reply, charge the
//! assistant owner for the actual cost, then persist either the reply or
//! the out-of-tokens apology. The inbound message is kept even when the
//! rest of the turn fails.

use crate::models::{Assistant, Conversation, Message, MessageRole, TokenOperation};
use crate::services::database::Database;
use crate::services::ledger::{DeductTokens, LedgerError, TokenLedger};
use crate::services::providers::{ChatProvider, ChatRole, ChatTurn};
use service_core::error::AppError;
use tracing::{error, info, instrument, warn};

/// Reply persisted in place of the AI answer when the owner's balance
/// cannot cover the turn.
pub const OUT_OF_TOKENS_REPLY: &str =
    "I apologize, but you've run out of tokens. Please upgrade your plan to continue chatting.";

/// How a turn ended. Both variants carry the assistant message persisted
/// for the visitor.
pub enum TurnOutcome {
    /// The reply was generated, charged and persisted.
    Answered { message: Message, tokens_used: i64 },

    /// The generated reply was discarded because the owner could not
    /// afford it; the apology was persisted instead and nothing was
    /// charged.
    OutOfTokens { message: Message },
}

/// System prompt for an assistant, derived from its stored configuration.
pub fn build_system_prompt(assistant: &Assistant) -> String {
    let length_guidance = match assistant.response_length.as_str() {
        "short" => "Keep responses brief and concise",
        "detailed" => "Provide detailed and comprehensive responses",
        _ => "Provide moderate length responses",
    };

    format!(
        "You are an AI assistant for {} purposes.\n\n\
         Instructions: {}\n\n\
         Tone: {}\n\
         Response Length: {}\n\n\
         Always stay in character and follow the instructions provided. \
         Be helpful, professional, and focused on the specific purpose of this assistant.",
        assistant.kind, assistant.instructions, assistant.tone, length_guidance
    )
}

/// Short text summary of a conversation from its user messages.
pub fn summarize(messages: &[Message]) -> String {
    let user_messages: Vec<&Message> = messages
        .iter()
        .filter(|m| m.parsed_role() == Some(MessageRole::User))
        .collect();

    let excerpt = |content: &str, limit: usize| -> String {
        if content.chars().count() > limit {
            let cut: String = content.chars().take(limit).collect();
            format!("{}...", cut)
        } else {
            content.to_string()
        }
    };

    match user_messages.as_slice() {
        [] => "No user messages".to_string(),
        [only] => excerpt(&only.content, 50),
        [first, .., last] => format!(
            "Started with: {} Latest: {}",
            excerpt(&first.content, 30),
            excerpt(&last.content, 30)
        ),
    }
}

/// Run one chat turn for a conversation.
#[instrument(skip_all, fields(conversation_id = %conversation.conversation_id, assistant_id = %conversation.assistant_id))]
pub async fn run_turn(
    db: &Database,
    ledger: &TokenLedger,
    provider: &dyn ChatProvider,
    conversation: &Conversation,
    user_message: &str,
) -> Result<TurnOutcome, AppError> {
    let assistant = db
        .find_assistant(conversation.assistant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Assistant not found")))?;

    // History before this turn; the inbound message goes to the provider
    // separately.
    let history_messages = db.list_messages(conversation.conversation_id).await?;

    // The visitor's message is free and is kept regardless of how the
    // rest of the turn goes.
    db.insert_message(
        conversation.conversation_id,
        MessageRole::User,
        user_message,
        0,
    )
    .await?;

    let history: Vec<ChatTurn> = history_messages
        .iter()
        .map(|m| ChatTurn {
            role: match m.parsed_role() {
                Some(MessageRole::Assistant) => ChatRole::Assistant,
                _ => ChatRole::User,
            },
            content: m.content.clone(),
        })
        .collect();

    let system_prompt = build_system_prompt(&assistant);

    let completion = match provider.generate(&system_prompt, &history, user_message).await {
        Ok(completion) => completion,
        Err(e) => {
            error!(error = %e, "Chat provider call failed; nothing charged");
            return Err(AppError::BadGateway(
                "Failed to generate AI response. Please try again.".to_string(),
            ));
        }
    };

    // The cost is only known now, after the expensive work. A reply the
    // owner cannot afford is discarded and never charged.
    let deduction = ledger
        .deduct(&DeductTokens {
            user_id: conversation.user_id.clone(),
            tokens: completion.tokens_used,
            operation: TokenOperation::ChatMessage,
            assistant_id: Some(conversation.assistant_id),
            description: Some(format!(
                "AI response in conversation {}",
                conversation.conversation_id
            )),
        })
        .await;

    match deduction {
        Ok(()) => {
            let message = db
                .insert_message(
                    conversation.conversation_id,
                    MessageRole::Assistant,
                    &completion.text,
                    completion.tokens_used,
                )
                .await?;

            db.record_turn_stats(
                conversation.conversation_id,
                conversation.assistant_id,
                completion.tokens_used,
            )
            .await?;

            info!(tokens = completion.tokens_used, "Chat turn completed");

            Ok(TurnOutcome::Answered {
                message,
                tokens_used: completion.tokens_used,
            })
        }
        Err(LedgerError::InsufficientTokens) => {
            warn!(
                tokens = completion.tokens_used,
                "Deduction failed, persisting apology"
            );

            let message = db
                .insert_message(
                    conversation.conversation_id,
                    MessageRole::Assistant,
                    OUT_OF_TOKENS_REPLY,
                    0,
                )
                .await?;

            Ok(TurnOutcome::OutOfTokens { message })
        }
        Err(e) => Err(e.into()),
    }
}
