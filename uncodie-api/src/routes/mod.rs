//! REST API Routes
//!
//! One module per resource, each exposing `create_router()` returning a
//! `Router<AppState>`. [`create_api_router`] nests them and applies the
//! shared layers.

pub mod agents;
pub mod commands;
pub mod health;
pub mod notifications;
pub mod robots;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::map_response,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::config::AppConfig;
use crate::error::attach_debug_details;
use crate::openapi::ApiDoc;
use crate::state::AppState;

pub use agents::create_router as agents_router;
pub use commands::create_router as commands_router;
pub use health::create_router as health_router;
pub use notifications::create_router as notifications_router;
pub use robots::create_router as robots_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// CORS
// ============================================================================

fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!("CORS: allowing origins: {:?}", config.cors_origins);
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins).allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            HeaderName::from_static(commands::SIGNATURE_HEADER),
        ])
    }
}

// ============================================================================
// ROUTER ASSEMBLY
// ============================================================================

/// Create the complete API router.
///
/// Layers, outermost first: CORS, tracing, request timeout and, in
/// development, the debug-excerpt mapper for system errors.
pub fn create_api_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);
    let timeout = state.config.request_timeout;
    let development = state.config.is_development();

    let mut router = Router::new()
        .nest("/api/notifications", notifications::create_router())
        .nest("/api/agents/sales", agents::create_router())
        .nest("/api/robots", robots::create_router())
        .nest("/api/commands", commands::create_router())
        .nest("/health", health::create_router())
        .route("/openapi.json", get(openapi_json))
        .with_state(state);

    if development {
        router = router.layer(map_response(attach_debug_details));
    }

    router
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
