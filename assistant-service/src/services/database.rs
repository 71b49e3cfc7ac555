//! Database service for assistant-service.
//!
//! Owns the connection pool and every query except balance mutation and
//! ledger writes, which belong to [`crate::services::TokenLedger`].

use crate::models::{
    Assistant, AssistantStatus, Conversation, ConversationStatus, CreateAssistant, Message,
    MessageRole, User,
};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// A conversation joined with the assistant it belongs to, for listings.
#[derive(Debug, Clone, FromRow)]
pub struct ConversationOverview {
    pub conversation_id: Uuid,
    pub assistant_id: Uuid,
    pub user_id: String,
    pub visitor_email: Option<String>,
    pub status: String,
    pub tokens_used: i64,
    pub created_utc: chrono::DateTime<chrono::Utc>,
    pub assistant_name: String,
    pub assistant_kind: String,
}

/// Aggregates over a user's conversations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTotals {
    pub total_conversations: i64,
    pub completed_conversations: i64,
    pub total_messages: i64,
    pub unique_visitors: i64,
    pub total_tokens_used: i64,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "assistant-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // User Operations
    // -------------------------------------------------------------------------

    /// Insert a new user with an empty balance. Returns None when the user
    /// already exists (provisioning is idempotent); the welcome grant is a
    /// separate ledger credit.
    #[instrument(skip(self, email, name), fields(user_id = %user_id))]
    pub async fn create_user(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
    ) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, email, name, plan, tokens)
            VALUES ($1, $2, $3, 'starter', 0)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING user_id, email, name, plan, tokens, created_utc, updated_utc
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create user: {}", e)))?;

        timer.observe_duration();

        if user.is_some() {
            info!("User created");
        }

        Ok(user)
    }

    /// Get a user by id.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, email, name, plan, tokens, created_utc, updated_utc
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        Ok(user)
    }

    // -------------------------------------------------------------------------
    // Assistant Operations
    // -------------------------------------------------------------------------

    /// Persist a new assistant. Callers must have settled the creation cost
    /// with the ledger before this runs.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, name = %input.name))]
    pub async fn create_assistant(&self, input: &CreateAssistant) -> Result<Assistant, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_assistant"])
            .start_timer();

        let assistant = sqlx::query_as::<_, Assistant>(
            r#"
            INSERT INTO assistants
                (assistant_id, user_id, name, kind, instructions, welcome_message,
                 delivery_method, tone, response_length, status, tokens_used)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING assistant_id, user_id, name, kind, instructions, welcome_message,
                      delivery_method, tone, response_length, status, tokens_used,
                      interactions, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.user_id)
        .bind(&input.name)
        .bind(input.kind.as_str())
        .bind(&input.instructions)
        .bind(&input.welcome_message)
        .bind(input.delivery_method.as_str())
        .bind(&input.tone)
        .bind(&input.response_length)
        .bind(input.status.as_str())
        .bind(input.tokens_used)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create assistant: {}", e))
        })?;

        timer.observe_duration();

        info!(assistant_id = %assistant.assistant_id, kind = %assistant.kind, "Assistant created");

        Ok(assistant)
    }

    /// List a user's assistants, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_assistants(&self, user_id: &str) -> Result<Vec<Assistant>, AppError> {
        let assistants = sqlx::query_as::<_, Assistant>(
            r#"
            SELECT assistant_id, user_id, name, kind, instructions, welcome_message,
                   delivery_method, tone, response_length, status, tokens_used,
                   interactions, created_utc, updated_utc
            FROM assistants
            WHERE user_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list assistants: {}", e))
        })?;

        Ok(assistants)
    }

    /// Get one of a user's assistants.
    #[instrument(skip(self), fields(user_id = %user_id, assistant_id = %assistant_id))]
    pub async fn get_assistant(
        &self,
        user_id: &str,
        assistant_id: Uuid,
    ) -> Result<Option<Assistant>, AppError> {
        let assistant = sqlx::query_as::<_, Assistant>(
            r#"
            SELECT assistant_id, user_id, name, kind, instructions, welcome_message,
                   delivery_method, tone, response_length, status, tokens_used,
                   interactions, created_utc, updated_utc
            FROM assistants
            WHERE user_id = $1 AND assistant_id = $2
            "#,
        )
        .bind(user_id)
        .bind(assistant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get assistant: {}", e)))?;

        Ok(assistant)
    }

    /// Get an assistant without an ownership check (public widget surface).
    #[instrument(skip(self), fields(assistant_id = %assistant_id))]
    pub async fn find_assistant(&self, assistant_id: Uuid) -> Result<Option<Assistant>, AppError> {
        let assistant = sqlx::query_as::<_, Assistant>(
            r#"
            SELECT assistant_id, user_id, name, kind, instructions, welcome_message,
                   delivery_method, tone, response_length, status, tokens_used,
                   interactions, created_utc, updated_utc
            FROM assistants
            WHERE assistant_id = $1
            "#,
        )
        .bind(assistant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get assistant: {}", e)))?;

        Ok(assistant)
    }

    /// Update an assistant's status.
    #[instrument(skip(self), fields(user_id = %user_id, assistant_id = %assistant_id, status = %status))]
    pub async fn update_assistant_status(
        &self,
        user_id: &str,
        assistant_id: Uuid,
        status: AssistantStatus,
    ) -> Result<Option<Assistant>, AppError> {
        let assistant = sqlx::query_as::<_, Assistant>(
            r#"
            UPDATE assistants
            SET status = $3, updated_utc = now()
            WHERE user_id = $1 AND assistant_id = $2
            RETURNING assistant_id, user_id, name, kind, instructions, welcome_message,
                      delivery_method, tone, response_length, status, tokens_used,
                      interactions, created_utc, updated_utc
            "#,
        )
        .bind(user_id)
        .bind(assistant_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update assistant: {}", e))
        })?;

        Ok(assistant)
    }

    /// Delete an assistant. Conversations cascade; ledger rows keep their
    /// history with the assistant reference cleared.
    #[instrument(skip(self), fields(user_id = %user_id, assistant_id = %assistant_id))]
    pub async fn delete_assistant(
        &self,
        user_id: &str,
        assistant_id: Uuid,
    ) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM assistants WHERE user_id = $1 AND assistant_id = $2")
            .bind(user_id)
            .bind(assistant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete assistant: {}", e))
            })?
            .rows_affected();

        Ok(deleted > 0)
    }

    /// Number of assistants a user owns.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn assistant_count(&self, user_id: &str) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM assistants WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to count assistants: {}", e))
                })?;

        Ok(count)
    }

    /// Sum of interaction counters across a user's assistants.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn total_interactions(&self, user_id: &str) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(interactions), 0)::BIGINT FROM assistants WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum interactions: {}", e))
        })?;

        Ok(total)
    }

    // -------------------------------------------------------------------------
    // Conversation Operations
    // -------------------------------------------------------------------------

    /// Start a conversation with an assistant. The owner of the assistant
    /// is recorded as the paying user.
    #[instrument(skip(self, assistant), fields(assistant_id = %assistant.assistant_id))]
    pub async fn create_conversation(
        &self,
        assistant: &Assistant,
        visitor_email: Option<&str>,
    ) -> Result<Conversation, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_conversation"])
            .start_timer();

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (conversation_id, assistant_id, user_id, visitor_email, status)
            VALUES ($1, $2, $3, $4, 'active')
            RETURNING conversation_id, assistant_id, user_id, visitor_email, status,
                      tokens_used, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(assistant.assistant_id)
        .bind(&assistant.user_id)
        .bind(visitor_email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create conversation: {}", e))
        })?;

        timer.observe_duration();

        info!(conversation_id = %conversation.conversation_id, "Conversation started");

        Ok(conversation)
    }

    /// Get a conversation by id.
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub async fn get_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT conversation_id, assistant_id, user_id, visitor_email, status,
                   tokens_used, created_utc, updated_utc
            FROM conversations
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get conversation: {}", e))
        })?;

        Ok(conversation)
    }

    /// Update a conversation's status (owner only).
    #[instrument(skip(self), fields(user_id = %user_id, conversation_id = %conversation_id))]
    pub async fn update_conversation_status(
        &self,
        user_id: &str,
        conversation_id: Uuid,
        status: ConversationStatus,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE conversations
            SET status = $3, updated_utc = now()
            WHERE user_id = $1 AND conversation_id = $2
            RETURNING conversation_id, assistant_id, user_id, visitor_email, status,
                      tokens_used, created_utc, updated_utc
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update conversation: {}", e))
        })?;

        Ok(conversation)
    }

    /// All of a user's conversations joined with their assistants,
    /// newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn conversation_overviews(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationOverview>, AppError> {
        let overviews = sqlx::query_as::<_, ConversationOverview>(
            r#"
            SELECT c.conversation_id, c.assistant_id, c.user_id, c.visitor_email,
                   c.status, c.tokens_used, c.created_utc,
                   a.name AS assistant_name, a.kind AS assistant_kind
            FROM conversations c
            JOIN assistants a ON a.assistant_id = c.assistant_id
            WHERE c.user_id = $1
            ORDER BY c.created_utc DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list conversations: {}", e))
        })?;

        Ok(overviews)
    }

    /// Messages of a conversation, oldest first.
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT message_id, conversation_id, role, content, tokens, created_utc
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list messages: {}", e)))?;

        Ok(messages)
    }

    /// Append a message to a conversation.
    #[instrument(skip(self, content), fields(conversation_id = %conversation_id, role = role.as_str(), tokens = tokens))]
    pub async fn insert_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        tokens: i64,
    ) -> Result<Message, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_message"])
            .start_timer();

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (message_id, conversation_id, role, content, tokens)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING message_id, conversation_id, role, content, tokens, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content)
        .bind(tokens)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert message: {}", e)))?;

        timer.observe_duration();

        Ok(message)
    }

    /// After a successfully charged turn, bump the conversation's token
    /// counter and the assistant's interaction/token counters together.
    #[instrument(skip(self), fields(conversation_id = %conversation_id, assistant_id = %assistant_id, tokens = tokens))]
    pub async fn record_turn_stats(
        &self,
        conversation_id: Uuid,
        assistant_id: Uuid,
        tokens: i64,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_turn_stats"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE conversations
            SET tokens_used = tokens_used + $2, updated_utc = now()
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(tokens)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update conversation stats: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE assistants
            SET interactions = interactions + 1, tokens_used = tokens_used + $2, updated_utc = now()
            WHERE assistant_id = $1
            "#,
        )
        .bind(assistant_id)
        .bind(tokens)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update assistant stats: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(())
    }

    /// Aggregates for the responses dashboard.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn response_totals(&self, user_id: &str) -> Result<ResponseTotals, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["response_totals"])
            .start_timer();

        let row = sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE c.status = 'completed'),
                (SELECT COUNT(*) FROM messages m
                 JOIN conversations mc ON mc.conversation_id = m.conversation_id
                 WHERE mc.user_id = $1),
                COUNT(DISTINCT c.visitor_email) FILTER (WHERE c.visitor_email IS NOT NULL),
                COALESCE(SUM(c.tokens_used), 0)::BIGINT
            FROM conversations c
            WHERE c.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to aggregate conversations: {}", e))
        })?;

        timer.observe_duration();

        Ok(ResponseTotals {
            total_conversations: row.0,
            completed_conversations: row.1,
            total_messages: row.2,
            unique_visitors: row.3,
            total_tokens_used: row.4,
        })
    }
}
