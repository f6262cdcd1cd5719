//! Completion callbacks, command lookups, health and OpenAPI endpoints.

#[path = "support/app.rs"]
mod app;

use app::{error_code, TestApp};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use uncodie_api::routes::commands::{sign_payload, SIGNATURE_HEADER};
use uncodie_core::{Command, CommandStatus};
use uncodie_test_utils::SalesWorld;

fn callback_request(body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::post("/api/commands/completion")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// ============================================================================
// COMPLETION CALLBACKS
// ============================================================================

#[tokio::test]
async fn completion_is_broadcast_to_subscribers() {
    let app = TestApp::new(SalesWorld::seed());
    let mut rx = app.state.hub.subscribe();

    let body = json!({ "id": "cmd_9", "status": "completed", "results": [{ "ok": true }] });
    let (status, response) = app.send(callback_request(&body.to_string(), None)).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(response["data"]["command_id"], "cmd_9");
    assert_eq!(response["data"]["status"], "completed");
    assert_eq!(response["data"]["waiters"], 1);

    let pushed = rx.try_recv().unwrap();
    assert_eq!(pushed.id, "cmd_9");
    assert_eq!(pushed.status, CommandStatus::Completed);
}

#[tokio::test]
async fn completion_with_valid_signature_is_accepted() {
    let app = TestApp::with_secret(SalesWorld::seed(), "s3cret");
    let body = json!({ "command_id": "cmd_3", "status": "failed" }).to_string();
    let signature = sign_payload(body.as_bytes(), "s3cret").unwrap();

    let (status, response) = app
        .send(callback_request(&body, Some(format!("sha256={}", signature))))
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(response["data"]["waiters"], 0);
}

#[tokio::test]
async fn completion_with_bad_signature_is_rejected() {
    let app = TestApp::with_secret(SalesWorld::seed(), "s3cret");
    let body = json!({ "command_id": "cmd_3", "status": "completed" }).to_string();
    let forged = sign_payload(body.as_bytes(), "guess").unwrap();
    let mut rx = app.state.hub.subscribe();

    let (status, response) = app
        .send(callback_request(&body, Some(format!("sha256={}", forged))))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response), "INVALID_SIGNATURE");

    let (status, _) = app.send(callback_request(&body, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn completion_without_id_is_validation_error() {
    let app = TestApp::new(SalesWorld::seed());

    let (status, response) = app
        .send(callback_request(&json!({ "status": "completed" }).to_string(), None))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "VALIDATION_ERROR");
}

// ============================================================================
// COMMAND LOOKUP
// ============================================================================

#[tokio::test]
async fn get_command_reports_effective_id() {
    let app = TestApp::new(SalesWorld::seed());
    let command: Command = serde_json::from_value(json!({
        "id": "cmd_5",
        "status": "running",
        "metadata": { "dbUuid": "550e8400-e29b-41d4-a716-446655440000" }
    }))
    .unwrap();
    app.commands.insert(command);

    let (status, body) = app.get("/api/commands/cmd_5").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "cmd_5");
    assert_eq!(body["data"]["effective_id"], "550e8400-e29b-41d4-a716-446655440000");
    assert_eq!(body["data"]["status"], "running");
}

#[tokio::test]
async fn get_unknown_command_is_404() {
    let app = TestApp::new(SalesWorld::seed());

    let (status, body) = app.get("/api/commands/cmd_missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "COMMAND_NOT_FOUND");
}

// ============================================================================
// HEALTH AND DOCS
// ============================================================================

#[tokio::test]
async fn health_probes() {
    let app = TestApp::new(SalesWorld::seed());

    let (status, body) = app.get("/health/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "pong");

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["details"]["database"]["status"], "healthy");

    app.world.store.fail_table("ping");
    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn system_errors_carry_debug_excerpt_in_development() {
    let app = TestApp::new(SalesWorld::seed());
    app.world.store.fail_table("leads");

    let (status, body) = app
        .post(
            "/api/notifications/leadAssignment",
            json!({
                "lead_id": app.world.lead.id,
                "assignee_id": app.world.member.id,
                "brief": "Warm",
                "next_steps": ["Call"]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&body), "SYSTEM_ERROR");
    assert!(body["error"]["details"]["debug"]
        .as_str()
        .unwrap()
        .contains("injected failure"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new(SalesWorld::seed());

    let (status, body) = app.get("/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/notifications/leadAssignment"].is_object());
}
