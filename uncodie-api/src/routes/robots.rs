//! Robot Instance REST API Routes

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    routing::post,
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use uncodie_agents::{AssistantOutcome, AssistantRequest, SalesAgents};

use crate::{
    error::ApiResult,
    state::AppState,
    types::{ApiResponse, RobotAssistantBody},
    validation::FieldErrors,
};

fn parse_assistant(body: RobotAssistantBody) -> ApiResult<AssistantRequest> {
    let mut errors = FieldErrors::new();
    let site_id = errors.require_uuid("site_id", body.site_id.as_deref());
    let instance_id = errors.require_uuid("instance_id", body.instance_id.as_deref());
    let message = errors.require_text("message", body.message.as_deref());
    let user_id = errors.optional_uuid("user_id", body.user_id.as_deref());
    errors.finish(|| {
        Some(AssistantRequest {
            site_id: site_id?,
            instance_id: instance_id?,
            message: message?,
            user_id,
        })
    })
}

/// POST /api/robots/instance/assistant
#[utoipa::path(
    post,
    path = "/api/robots/instance/assistant",
    tag = "Robots",
    request_body = RobotAssistantBody,
    responses(
        (status = 200, description = "Assistant reply and planned actions", body = AssistantOutcome),
        (status = 400, description = "Invalid request or instance not usable", body = crate::error::ErrorEnvelope),
        (status = 404, description = "Site or instance not found", body = crate::error::ErrorEnvelope),
        (status = 500, description = "Command failed or did not complete", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn instance_assistant(
    State(agents): State<SalesAgents>,
    payload: Result<Json<RobotAssistantBody>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = payload?;
    let request = parse_assistant(body)?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let outcome = agents.robot_assistant(request, &cancel).await?;
    Ok(ApiResponse::ok(outcome))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/instance/assistant", post(instance_assistant))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_trimmed_and_required() {
        let err = parse_assistant(RobotAssistantBody {
            site_id: Some("550e8400-e29b-41d4-a716-446655440000".to_string()),
            instance_id: Some("550e8400-e29b-41d4-a716-446655440001".to_string()),
            message: Some("   ".to_string()),
            user_id: None,
        })
        .unwrap_err();
        assert!(err.message.starts_with("message"));

        let ok = parse_assistant(RobotAssistantBody {
            site_id: Some("550e8400-e29b-41d4-a716-446655440000".to_string()),
            instance_id: Some("550e8400-e29b-41d4-a716-446655440001".to_string()),
            message: Some(" open the dashboard ".to_string()),
            user_id: None,
        })
        .unwrap();
        assert_eq!(ok.message, "open the dashboard");
    }
}
