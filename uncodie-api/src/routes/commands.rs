//! Command REST API Routes
//!
//! The agent framework pushes command snapshots to `/completion`; they are
//! broadcast on the [`CompletionHub`] so that waiting workflows wake up
//! without polling. `/{id}` proxies a lookup for operators.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sha2::Sha256;
use uncodie_core::{Command, CommandMetadata, CommandStatus};

use crate::{
    error::{ApiError, ApiResult, ErrorCode},
    state::AppState,
    types::{ApiResponse, CommandAccepted, CommandResponse},
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-uncodie-signature";
const SIGNATURE_PREFIX: &str = "sha256=";

/// Completion snapshot as pushed by the agent framework.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CompletionCallback {
    #[serde(alias = "id")]
    pub command_id: String,
    #[serde(default)]
    pub status: CommandStatus,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<JsonValue>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: CommandMetadata,
}

impl From<CompletionCallback> for Command {
    fn from(callback: CompletionCallback) -> Self {
        Command {
            id: callback.command_id,
            status: callback.status,
            results: callback.results,
            metadata: callback.metadata,
        }
    }
}

/// Hex HMAC-SHA256 of `payload`, as expected after `sha256=` in
/// [`SIGNATURE_HEADER`].
pub fn sign_payload(payload: &[u8], secret: &str) -> Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("Failed to initialize HMAC: {}", e))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify_signature(headers: &HeaderMap, body: &[u8], secret: &str) -> ApiResult<()> {
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::invalid_signature("Missing callback signature"))?;
    let signature_hex = header.trim().strip_prefix(SIGNATURE_PREFIX).unwrap_or(header.trim());
    let expected = hex::decode(signature_hex)
        .map_err(|_| ApiError::invalid_signature("Invalid callback signature encoding"))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::system(format!("Failed to initialize HMAC: {}", e)))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| ApiError::invalid_signature("Invalid callback signature"))
}

/// POST /api/commands/completion
#[utoipa::path(
    post,
    path = "/api/commands/completion",
    tag = "Commands",
    request_body = CompletionCallback,
    responses(
        (status = 202, description = "Snapshot accepted and broadcast", body = CommandAccepted),
        (status = 400, description = "Malformed snapshot", body = crate::error::ErrorEnvelope),
        (status = 401, description = "Missing or wrong signature", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn completion(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    if let Some(secret) = state.callback_secret.as_deref() {
        verify_signature(&headers, &body, secret)?;
    }

    let callback: CompletionCallback = serde_json::from_slice(&body)
        .map_err(|e| ApiError::invalid_field("body", format!("Invalid completion payload: {}", e)))?;
    if callback.command_id.trim().is_empty() {
        return Err(ApiError::invalid_field("command_id", "is required"));
    }

    let command = Command::from(callback);
    let command_id = command.id.clone();
    let status = command.status;
    let waiters = state.hub.publish(command);
    tracing::info!(%command_id, status = status.as_str(), waiters, "Completion received");

    Ok(ApiResponse::with_status(
        StatusCode::ACCEPTED,
        CommandAccepted {
            command_id,
            status,
            waiters,
        },
    ))
}

/// GET /api/commands/{id}
#[utoipa::path(
    get,
    path = "/api/commands/{id}",
    tag = "Commands",
    params(("id" = String, Path, description = "Framework command id")),
    responses(
        (status = 200, description = "Current command snapshot", body = CommandResponse),
        (status = 404, description = "Command not found", body = crate::error::ErrorEnvelope),
        (status = 500, description = "Agent framework unavailable", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn get_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let command = state
        .commands
        .get_command_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorCode::CommandNotFound, &id))?;
    Ok(ApiResponse::ok(CommandResponse::from(command)))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/completion", post(completion))
        .route("/:id", get(get_command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"id":"cmd_1","status":"completed"}"#;
        let signature = sign_payload(body, "s3cret").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&format!("sha256={}", signature)).unwrap(),
        );
        assert!(verify_signature(&headers, body, "s3cret").is_ok());

        let err = verify_signature(&headers, body, "other").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSignature);
    }

    #[test]
    fn test_missing_signature_is_rejected() {
        let err = verify_signature(&HeaderMap::new(), b"{}", "s3cret").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSignature);
    }

    #[test]
    fn test_callback_accepts_id_alias() {
        let callback: CompletionCallback = serde_json::from_value(json!({
            "id": "cmd_7",
            "status": "failed",
            "results": [{ "type": "message" }],
            "metadata": { "dbUuid": "550e8400-e29b-41d4-a716-446655440000" }
        }))
        .unwrap();
        let command = Command::from(callback);
        assert_eq!(command.id, "cmd_7");
        assert_eq!(command.status, CommandStatus::Failed);
        assert!(command.has_results());
        assert_eq!(command.effective_id(), "550e8400-e29b-41d4-a716-446655440000");
    }
}
