//! Assistant lifecycle integration tests: creation pricing, duplication,
//! status changes, deletion and usage reporting.

mod common;

use common::{test_user_id, try_spawn_app};
use serde_json::{json, Value};

// 400 chars of instructions + 40 chars of welcome = 440 chars = 110 tokens,
// plus the 100-token base cost.
fn instructions() -> String {
    "x".repeat(400)
}

fn welcome() -> String {
    "y".repeat(40)
}

const EXPECTED_CREATION_COST: i64 = 110 + 100;

#[tokio::test]
async fn creation_charges_instruction_cost_plus_base() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;

    let response = app
        .create_assistant(&user_id, "Pricing Helper", &instructions(), &welcome())
        .await;
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["success"], true);
    assert_eq!(body["tokens_used"], EXPECTED_CREATION_COST);
    assert_eq!(body["assistant"]["status"], "active");
    // The assistant records only the instruction text cost.
    assert_eq!(body["assistant"]["tokens_used"], 110);

    assert_eq!(app.balance(&user_id).await, 5_000 - EXPECTED_CREATION_COST);

    let rows = app.ledger_rows(&user_id).await;
    assert_eq!(
        rows.last().map(|r| (r.0.as_str(), r.1)),
        Some(("create_assistant", EXPECTED_CREATION_COST))
    );
}

#[tokio::test]
async fn creation_without_funds_leaves_no_assistant() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;
    app.deduct(&user_id, 4_950, "chat_message").await;

    let response = app
        .create_assistant(&user_id, "Too Expensive", &instructions(), &welcome())
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["error"], "Insufficient tokens");

    // No partial writes: no assistant, no ledger row, balance untouched.
    let response = app
        .client
        .get(format!("{}/api/assistants", app.address))
        .header("X-User-ID", &user_id)
        .send()
        .await
        .expect("Failed to execute request");
    let assistants: Vec<Value> = response.json().await.expect("json body");
    assert!(assistants.is_empty());

    assert_eq!(app.balance(&user_id).await, 50);
    assert_eq!(app.ledger_rows(&user_id).await.len(), 2);
}

#[tokio::test]
async fn creation_rejects_unknown_kind_before_charging() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;

    let response = app
        .client
        .post(format!("{}/api/assistants", app.address))
        .header("X-User-ID", &user_id)
        .json(&json!({
            "name": "Odd One",
            "kind": "banking",
            "instructions": "help",
            "welcome_message": "hi",
            "delivery_method": "widget",
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 400);

    assert_eq!(app.balance(&user_id).await, 5_000);
}

#[tokio::test]
async fn duplication_costs_like_creation_and_starts_as_draft() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;

    let response = app
        .create_assistant(&user_id, "Original", &instructions(), &welcome())
        .await;
    let body: Value = response.json().await.expect("json body");
    let assistant_id = body["assistant"]["assistant_id"]
        .as_str()
        .expect("assistant id")
        .to_string();

    let response = app
        .client
        .post(format!(
            "{}/api/assistants/{}/duplicate",
            app.address, assistant_id
        ))
        .header("X-User-ID", &user_id)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["assistant"]["name"], "Original (Copy)");
    assert_eq!(body["assistant"]["status"], "draft");
    assert_eq!(body["tokens_used"], EXPECTED_CREATION_COST);

    assert_eq!(
        app.balance(&user_id).await,
        5_000 - 2 * EXPECTED_CREATION_COST
    );

    let rows = app.ledger_rows(&user_id).await;
    let last = rows.last().expect("ledger row");
    assert_eq!(last.0, "duplicate_assistant");
    assert_eq!(last.1, EXPECTED_CREATION_COST);
    assert_eq!(last.2.map(|id| id.to_string()), Some(assistant_id));
}

#[tokio::test]
async fn status_updates_and_deletion() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;

    let response = app
        .create_assistant(&user_id, "Short Lived", "help visitors", "hi")
        .await;
    let body: Value = response.json().await.expect("json body");
    let assistant_id = body["assistant"]["assistant_id"]
        .as_str()
        .expect("assistant id")
        .to_string();

    let response = app
        .client
        .put(format!("{}/api/assistants/{}", app.address, assistant_id))
        .header("X-User-ID", &user_id)
        .json(&json!({ "status": "paused" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["assistant"]["status"], "paused");

    let response = app
        .client
        .put(format!("{}/api/assistants/{}", app.address, assistant_id))
        .header("X-User-ID", &user_id)
        .json(&json!({ "status": "retired" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 400, "unknown status is rejected");

    let response = app
        .client
        .delete(format!("{}/api/assistants/{}", app.address, assistant_id))
        .header("X-User-ID", &user_id)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);

    let response = app
        .client
        .get(format!("{}/api/assistants/{}", app.address, assistant_id))
        .header("X-User-ID", &user_id)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);

    // The ledger keeps its history even after the assistant is gone.
    assert_eq!(app.ledger_rows(&user_id).await.len(), 2);
}

#[tokio::test]
async fn assistants_are_scoped_to_their_owner() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let owner = test_user_id();
    let other = test_user_id();
    app.provision_user(&owner).await;
    app.provision_user(&other).await;

    let response = app
        .create_assistant(&owner, "Private", "help visitors", "hi")
        .await;
    let body: Value = response.json().await.expect("json body");
    let assistant_id = body["assistant"]["assistant_id"]
        .as_str()
        .expect("assistant id")
        .to_string();

    let response = app
        .client
        .get(format!("{}/api/assistants/{}", app.address, assistant_id))
        .header("X-User-ID", &other)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn usage_and_dashboard_reflect_plan_and_counts() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;
    app.create_assistant(&user_id, "Helper", "help visitors", "hi")
        .await;

    let response = app
        .client
        .get(format!("{}/api/user/usage", app.address))
        .header("X-User-ID", &user_id)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let usage: Value = response.json().await.expect("json body");
    assert_eq!(usage["plan"], "starter");
    assert_eq!(usage["assistants"]["current"], 1);
    assert_eq!(usage["assistants"]["limit"], 5);
    assert_eq!(usage["assistants"]["percentage"], 20);
    assert_eq!(usage["tokens"]["limit"], 5_000);

    let response = app
        .client
        .get(format!("{}/api/user/dashboard/stats", app.address))
        .header("X-User-ID", &user_id)
        .send()
        .await
        .expect("Failed to execute request");
    let stats: Value = response.json().await.expect("json body");
    assert_eq!(stats["assistant_count"], 1);
    assert_eq!(stats["total_interactions"], 0);
}
