//! Token ledger integration tests: provisioning grants, deductions,
//! credits, plan resets and the concurrent-deduction guarantee.

mod common;

use common::{test_user_id, try_spawn_app};
use serde_json::{json, Value};

#[tokio::test]
async fn provisioning_grants_welcome_bonus_once() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();

    let response = app.provision_user(&user_id).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["plan"], "starter");
    assert_eq!(body["tokens"], 5_000);

    let rows = app.ledger_rows(&user_id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "welcome_bonus");
    assert_eq!(rows[0].1, -5_000, "welcome grant is recorded as a credit");

    // Provisioning again changes nothing.
    let response = app.provision_user(&user_id).await;
    assert_eq!(response.status(), 200);
    assert_eq!(app.balance(&user_id).await, 5_000);
    assert_eq!(app.ledger_rows(&user_id).await.len(), 1);
}

#[tokio::test]
async fn deduction_reduces_balance_and_appends_one_row() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;

    // Bring the balance to 150, then charge 100.
    let response = app.deduct(&user_id, 4_850, "chat_message").await;
    assert_eq!(response.status(), 200);

    let response = app.deduct(&user_id, 100, "chat_message").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["success"], true);

    assert_eq!(app.balance(&user_id).await, 50);

    let rows = app.ledger_rows(&user_id).await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2], ("chat_message".to_string(), 100, None));
}

#[tokio::test]
async fn insufficient_funds_changes_nothing() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;
    app.deduct(&user_id, 4_950, "chat_message").await;

    let response = app.deduct(&user_id, 100, "chat_message").await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["error"], "Insufficient tokens");

    // No balance change, no ledger row.
    assert_eq!(app.balance(&user_id).await, 50);
    assert_eq!(app.ledger_rows(&user_id).await.len(), 2);
}

#[tokio::test]
async fn invalid_deductions_are_rejected_before_storage() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;

    let response = app.deduct(&user_id, 0, "chat_message").await;
    assert_eq!(response.status(), 422);

    let response = app.deduct(&user_id, -5, "chat_message").await;
    assert_eq!(response.status(), 422);

    let response = app.deduct(&user_id, 100, "mining").await;
    assert_eq!(response.status(), 400);

    assert_eq!(app.balance(&user_id).await, 5_000);
    assert_eq!(app.ledger_rows(&user_id).await.len(), 1);
}

#[tokio::test]
async fn purchase_credits_balance_with_negative_ledger_amount() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;
    app.deduct(&user_id, 4_950, "chat_message").await;

    let response = app
        .client
        .put(format!("{}/api/user/tokens", app.address))
        .header("X-User-ID", &user_id)
        .json(&json!({ "tokens": 500, "reason": "Purchased 500 tokens" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);

    assert_eq!(app.balance(&user_id).await, 550);

    let rows = app.ledger_rows(&user_id).await;
    assert_eq!(rows.last().map(|r| (r.0.as_str(), r.1)), Some(("token_purchase", -500)));
}

#[tokio::test]
async fn plan_change_resets_balance_to_allotment() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;
    app.deduct(&user_id, 1_234, "chat_message").await;

    let response = app
        .client
        .put(format!("{}/api/user/plan", app.address))
        .header("X-User-ID", &user_id)
        .json(&json!({ "new_plan": "pro" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);

    // Exactly the allotment: the unspent remainder is gone.
    assert_eq!(app.balance(&user_id).await, 25_000);

    let rows = app.ledger_rows(&user_id).await;
    assert_eq!(rows.last().map(|r| (r.0.as_str(), r.1)), Some(("plan_upgrade", -25_000)));

    let response = app
        .client
        .get(format!("{}/api/user/tokens", app.address))
        .header("X-User-ID", &user_id)
        .send()
        .await
        .expect("Failed to execute request");
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["plan"], "pro");
    assert_eq!(body["tokens"], 25_000);
}

#[tokio::test]
async fn unknown_plan_is_rejected() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;

    let response = app
        .client
        .put(format!("{}/api/user/plan", app.address))
        .header("X-User-ID", &user_id)
        .json(&json!({ "new_plan": "platinum" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 400);
    assert_eq!(app.balance(&user_id).await, 5_000);
}

#[tokio::test]
async fn concurrent_deductions_cannot_overdraw() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;

    // Two 3000-token deductions against a 5000 balance: only one fits.
    let (first, second) = tokio::join!(
        app.deduct(&user_id, 3_000, "chat_message"),
        app.deduct(&user_id, 3_000, "chat_message"),
    );

    let statuses = [first.status().as_u16(), second.status().as_u16()];
    assert!(
        statuses.contains(&200) && statuses.contains(&400),
        "expected exactly one success and one insufficient-funds failure, got {:?}",
        statuses
    );

    let balance = app.balance(&user_id).await;
    assert_eq!(balance, 2_000);
    assert!(balance >= 0);

    // One welcome credit and exactly one consumption row.
    let rows = app.ledger_rows(&user_id).await;
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn ledger_reconciles_with_balance() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;
    app.deduct(&user_id, 100, "chat_message").await;

    app.client
        .put(format!("{}/api/user/tokens", app.address))
        .header("X-User-ID", &user_id)
        .json(&json!({ "tokens": 200, "reason": "top-up" }))
        .send()
        .await
        .expect("Failed to execute request");

    // Between plan resets, the balance is the negated ledger sum.
    let rows = app.ledger_rows(&user_id).await;
    let ledger_sum: i64 = rows.iter().map(|r| r.1).sum();
    assert_eq!(app.balance(&user_id).await, -ledger_sum);
}

#[tokio::test]
async fn token_history_lists_newest_first() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let user_id = test_user_id();
    app.provision_user(&user_id).await;
    app.deduct(&user_id, 100, "chat_message").await;
    app.deduct(&user_id, 40, "create_assistant").await;

    let response = app
        .client
        .get(format!("{}/api/user/token-history", app.address))
        .header("X-User-ID", &user_id)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);

    let entries: Vec<Value> = response.json().await.expect("json body");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["operation"], "create_assistant");
    assert_eq!(entries[2]["operation"], "welcome_bonus");
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let response = app
        .client
        .get(format!("{}/api/user/tokens", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 401);
}
