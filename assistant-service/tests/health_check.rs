//! Health and metrics endpoint tests.

mod common;

use common::try_spawn_app;
use serde_json::Value;

#[tokio::test]
async fn health_check_works() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "assistant-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let response = app
        .client
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn metrics_are_exposed_in_text_format() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    // Generate at least one tracked request first.
    app.client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    let response = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("text body");
    assert!(body.contains("assistant_http_requests_total"));
}
