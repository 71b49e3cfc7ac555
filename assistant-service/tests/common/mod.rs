//! Common test utilities for assistant-service integration tests.
//!
//! These tests drive the real HTTP surface against PostgreSQL. When
//! TEST_DATABASE_URL is not set the spawn helper returns None and the
//! calling test skips with a notice.

use assistant_service::config::{AssistantConfig, ChatBackend, ChatConfig, DatabaseConfig};
use assistant_service::services::providers::ChatProvider;
use assistant_service::startup::Application;
use serde_json::json;
use service_core::config::Config as CommonConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,assistant_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub pool: PgPool,
}

fn test_config(database_url: String) -> AssistantConfig {
    AssistantConfig {
        common: CommonConfig {
            port: 0,
            log_level: "debug".to_string(),
        },
        database: DatabaseConfig {
            url: database_url,
            max_connections: 4,
            min_connections: 1,
        },
        chat: ChatConfig {
            backend: ChatBackend::Mock,
            gemini_api_key: String::new(),
            gemini_model: "gemini-1.5-flash".to_string(),
        },
    }
}

/// Spawn a test application with the mock chat provider. Returns None
/// when TEST_DATABASE_URL is not set.
pub async fn try_spawn_app() -> Option<TestApp> {
    try_spawn_app_with_provider(None).await
}

/// Spawn a test application, optionally with an explicit chat provider.
pub async fn try_spawn_app_with_provider(
    provider: Option<Arc<dyn ChatProvider>>,
) -> Option<TestApp> {
    init_tracing();

    let database_url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return None;
        }
    };

    let config = test_config(database_url.clone());

    let app = match provider {
        Some(p) => Application::build_with_provider(config, p).await,
        None => Application::build(config).await,
    }
    .expect("Failed to build application");

    let port = app.port();

    // Start the application in the background
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect assertion pool");

    Some(TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        pool,
    })
}

/// Fresh externally-issued user id, unique per test.
pub fn test_user_id() -> String {
    format!("user_{}", Uuid::new_v4().simple())
}

impl TestApp {
    /// Provision a user through the API; new users get the welcome grant.
    pub async fn provision_user(&self, user_id: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/user", self.address))
            .header("X-User-ID", user_id)
            .json(&json!({
                "email": format!("{}@example.com", user_id),
                "name": "Test User",
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Deduct tokens through the API.
    pub async fn deduct(&self, user_id: &str, tokens: i64, operation: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/user/tokens", self.address))
            .header("X-User-ID", user_id)
            .json(&json!({ "tokens": tokens, "operation": operation }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create an assistant through the API.
    pub async fn create_assistant(
        &self,
        user_id: &str,
        name: &str,
        instructions: &str,
        welcome_message: &str,
    ) -> reqwest::Response {
        self.client
            .post(format!("{}/api/assistants", self.address))
            .header("X-User-ID", user_id)
            .json(&json!({
                "name": name,
                "kind": "sales",
                "instructions": instructions,
                "welcome_message": welcome_message,
                "delivery_method": "widget",
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Current materialized balance, straight from the store.
    pub async fn balance(&self, user_id: &str) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT tokens FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .expect("User should exist")
    }

    /// Ledger rows for a user in insertion order:
    /// (operation, tokens, assistant_id).
    pub async fn ledger_rows(&self, user_id: &str) -> Vec<(String, i64, Option<Uuid>)> {
        sqlx::query_as::<_, (String, i64, Option<Uuid>)>(
            "SELECT operation, tokens, assistant_id FROM token_usage \
             WHERE user_id = $1 ORDER BY created_utc, usage_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .expect("Failed to read ledger")
    }
}
