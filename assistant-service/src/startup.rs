use crate::config::{AssistantConfig, ChatBackend};
use crate::handlers::{assistants, chat, conversations, health, users};
use crate::middleware::metrics::metrics_middleware;
use crate::services::providers::gemini::{GeminiChatProvider, GeminiConfig};
use crate::services::providers::mock::MockChatProvider;
use crate::services::providers::ChatProvider;
use crate::services::{Database, TokenLedger};
use axum::{
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: AssistantConfig,
    pub db: Database,
    pub ledger: TokenLedger,
    pub provider: Arc<dyn ChatProvider>,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: AssistantConfig) -> Result<Self, AppError> {
        let provider: Arc<dyn ChatProvider> = match config.chat.backend {
            ChatBackend::Gemini => {
                let gemini = GeminiChatProvider::new(GeminiConfig {
                    api_key: config.chat.gemini_api_key.clone(),
                    model: config.chat.gemini_model.clone(),
                })
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{}", e)))?;

                tracing::info!(model = %config.chat.gemini_model, "Initialized Gemini chat provider");
                Arc::new(gemini)
            }
            ChatBackend::Mock => {
                tracing::info!("Initialized mock chat provider");
                Arc::new(MockChatProvider::new(true))
            }
        };

        Self::build_with_provider(config, provider).await
    }

    /// Build with an explicit chat provider.
    pub async fn build_with_provider(
        config: AssistantConfig,
        provider: Arc<dyn ChatProvider>,
    ) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            e
        })?;

        let ledger = TokenLedger::new(db.pool().clone());

        let state = AppState {
            config: config.clone(),
            db,
            ledger,
            provider,
        };

        let app = Router::new()
            .route("/health", get(health::health_check))
            .route("/ready", get(health::readiness_check))
            .route("/metrics", get(health::metrics_endpoint))
            .route(
                "/api/user",
                get(users::get_user).post(users::provision_user),
            )
            .route(
                "/api/user/tokens",
                get(users::get_tokens)
                    .post(users::deduct_tokens)
                    .put(users::purchase_tokens),
            )
            .route("/api/user/plan", put(users::update_plan))
            .route("/api/user/token-history", get(users::token_history))
            .route("/api/user/usage", get(users::usage_report))
            .route("/api/user/dashboard/stats", get(users::dashboard_stats))
            .route(
                "/api/assistants",
                get(assistants::list_assistants).post(assistants::create_assistant),
            )
            .route(
                "/api/assistants/:id",
                get(assistants::get_assistant)
                    .put(assistants::update_assistant_status)
                    .delete(assistants::delete_assistant),
            )
            .route(
                "/api/assistants/:id/duplicate",
                post(assistants::duplicate_assistant),
            )
            .route(
                "/api/conversations/responses",
                get(conversations::list_responses),
            )
            .route(
                "/api/conversations/responses/stats",
                get(conversations::response_stats),
            )
            .route(
                "/api/conversations/:id",
                get(conversations::get_conversation).put(conversations::update_status),
            )
            .route(
                "/api/conversations/:id/message",
                post(conversations::send_message),
            )
            .route(
                "/api/chat/:assistant_id",
                get(chat::assistant_card).post(chat::start_conversation),
            )
            .layer(from_fn(metrics_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(from_fn(request_id_middleware))
            .with_state(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
