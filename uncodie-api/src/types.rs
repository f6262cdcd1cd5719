//! API Request and Response Types
//!
//! Request bodies keep ids as strings so that malformed values become
//! field-level `VALIDATION_ERROR`s instead of opaque JSON rejections.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uncodie_core::{Command, CommandStatus, EntityId, Lead, Profile};

// ============================================================================
// SUCCESS ENVELOPE
// ============================================================================

/// `{ "success": true, "data": ... }`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        Self::with_status(StatusCode::OK, data)
    }

    /// 207 when some steps of a multi-step operation failed, 200 otherwise.
    pub fn partial(data: T, errors: &[String]) -> Response {
        let status = if errors.is_empty() {
            StatusCode::OK
        } else {
            StatusCode::MULTI_STATUS
        };
        Self::with_status(status, data)
    }

    pub fn with_status(status: StatusCode, data: T) -> Response {
        (status, Json(ApiResponse { success: true, data })).into_response()
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LeadAssignmentRequest {
    #[schema(format = Uuid)]
    pub lead_id: Option<String>,
    #[schema(format = Uuid)]
    pub assignee_id: Option<String>,
    pub brief: Option<String>,
    pub next_steps: Option<Vec<String>>,
    /// `low`, `medium`, `high` or `urgent` (default `medium`)
    pub priority: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub additional_context: Option<String>,
    /// Also notify the rest of the team (default `true`)
    pub include_team_notification: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssigneeSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: EntityId,
    pub name: String,
    pub email: Option<String>,
}

impl From<&Profile> for AssigneeSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            name: profile.display_name().to_string(),
            email: profile.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct EmailsSent {
    pub assignee: usize,
    pub team: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadAssignmentResponse {
    pub lead: Lead,
    pub assignee: AssigneeSummary,
    pub assignment_updated: bool,
    pub emails_sent: EmailsSent,
    pub notifications_created: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewCampaignsRequest {
    #[schema(format = Uuid)]
    pub site_id: Option<String>,
    /// Default `pending_review`
    pub status: Option<String>,
    pub campaign_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewContentRequest {
    #[schema(format = Uuid)]
    pub site_id: Option<String>,
    /// Default `draft`
    pub status: Option<String>,
    pub content_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DigestEntry {
    #[schema(value_type = String, format = "uuid")]
    pub id: EntityId,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DigestResponse {
    #[schema(value_type = String, format = "uuid")]
    pub site_id: EntityId,
    pub status: String,
    /// `false` when nothing matched and nobody was contacted
    pub notified: bool,
    pub items: Vec<DigestEntry>,
    pub notifications_created: usize,
    pub emails_sent: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct QuotaErrorRequest {
    #[schema(format = Uuid)]
    pub site_id: Option<String>,
    pub error_message: Option<String>,
    pub provider: Option<String>,
    pub quota_type: Option<String>,
    pub command_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuotaErrorResponse {
    #[schema(value_type = String, format = "uuid")]
    pub site_id: EntityId,
    pub owner_notified: bool,
    pub notifications_created: usize,
    pub emails_sent: usize,
    pub errors: Vec<String>,
}

// ============================================================================
// AGENTS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LeadFollowUpBody {
    #[schema(format = Uuid)]
    pub site_id: Option<String>,
    #[schema(format = Uuid)]
    pub lead_id: Option<String>,
    #[schema(format = Uuid)]
    pub agent_id: Option<String>,
    #[schema(format = Uuid)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LeadGenerationBody {
    #[schema(format = Uuid)]
    pub site_id: Option<String>,
    #[schema(format = Uuid)]
    pub segment_id: Option<String>,
    /// 1 to 50, default 10
    pub max_leads: Option<i64>,
    #[schema(format = Uuid)]
    pub agent_id: Option<String>,
    #[schema(format = Uuid)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LeadSelectionBody {
    #[schema(format = Uuid)]
    pub site_id: Option<String>,
    #[schema(format = Uuid)]
    pub segment_id: Option<String>,
    pub status: Option<String>,
    /// 1 to 100, default 25
    pub limit: Option<i64>,
    #[schema(format = Uuid)]
    pub agent_id: Option<String>,
    #[schema(format = Uuid)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RobotAssistantBody {
    #[schema(format = Uuid)]
    pub site_id: Option<String>,
    #[schema(format = Uuid)]
    pub instance_id: Option<String>,
    pub message: Option<String>,
    #[schema(format = Uuid)]
    pub user_id: Option<String>,
}

// ============================================================================
// COMMANDS
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommandAccepted {
    pub command_id: String,
    pub status: CommandStatus,
    /// Workflows that were waiting on the hub when the snapshot arrived
    pub waiters: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommandResponse {
    pub id: String,
    /// Persisted row id when known, otherwise `id`
    pub effective_id: String,
    pub status: CommandStatus,
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<JsonValue>,
    #[schema(value_type = Object)]
    pub metadata: JsonValue,
}

impl From<Command> for CommandResponse {
    fn from(command: Command) -> Self {
        let effective_id = command.effective_id();
        let metadata = serde_json::to_value(&command.metadata).unwrap_or(JsonValue::Null);
        Self {
            id: command.id,
            effective_id,
            status: command.status,
            results: command.results,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_status() {
        let ok = ApiResponse::partial(json!({}), &[]);
        assert_eq!(ok.status(), StatusCode::OK);
        let partial = ApiResponse::partial(json!({}), &["email failed".to_string()]);
        assert_eq!(partial.status(), StatusCode::MULTI_STATUS);
    }

    #[test]
    fn test_command_response_prefers_db_uuid() {
        let command: Command = serde_json::from_value(json!({
            "id": "cmd_9",
            "status": "completed",
            "metadata": { "dbUuid": "550e8400-e29b-41d4-a716-446655440000", "agent": "sales" }
        }))
        .unwrap();
        let response = CommandResponse::from(command);
        assert_eq!(response.effective_id, "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(response.metadata["agent"], "sales");
    }

    #[test]
    fn test_request_ignores_unknown_fields() {
        let body: LeadAssignmentRequest =
            serde_json::from_value(json!({ "lead_id": "x", "extra": 1 })).unwrap();
        assert_eq!(body.lead_id.as_deref(), Some("x"));
        assert!(body.next_steps.is_none());
    }
}
