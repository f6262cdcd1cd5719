//! In-process API harness: a seeded store, a scripted agent framework and a
//! recording email client behind the real router.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uncodie_api::{create_api_router, AppConfig, AppState, MockEmailClient};
use uncodie_commands::{Backoff, WaitPolicy};
use uncodie_test_utils::{MockCommandService, SalesWorld};

pub struct TestApp {
    pub world: SalesWorld,
    pub commands: Arc<MockCommandService>,
    pub email: Arc<MockEmailClient>,
    pub state: AppState,
    router: Router,
}

pub fn fast_policy() -> WaitPolicy {
    WaitPolicy {
        max_attempts: 3,
        backoff: Backoff::Fixed { delay_ms: 10 },
        ..Default::default()
    }
}

impl TestApp {
    pub fn new(world: SalesWorld) -> Self {
        Self::build(world, None)
    }

    pub fn with_secret(world: SalesWorld, secret: &str) -> Self {
        Self::build(world, Some(secret.to_string()))
    }

    fn build(world: SalesWorld, secret: Option<String>) -> Self {
        let commands = Arc::new(MockCommandService::new());
        let email = Arc::new(MockEmailClient::new());
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(world.store.clone()),
            commands.clone(),
            email.clone(),
            fast_policy(),
            secret,
        );
        let router = create_api_router(state.clone());
        Self {
            world,
            commands,
            email,
            state,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("valid request");
        self.send(request).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::get(path).body(Body::empty()).expect("valid request");
        self.send(request).await
    }
}

/// `error.code` of an error envelope.
pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
