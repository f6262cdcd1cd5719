//! OpenAPI Specification for the Uncodie API
//!
//! Generated by utoipa from the route annotations and schema derives.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode, ErrorEnvelope, FieldError};
use crate::notify::TeamNotifyReport;
use crate::routes::commands::CompletionCallback;
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{agents, commands, health, notifications, robots};
use crate::types::*;

use uncodie_agents::{
    AssistantOutcome, ChannelCorrection, CommandIds, FollowUpOutcome, LeadGenerationOutcome,
    LeadSelection, LeadSelectionOutcome,
};
use uncodie_core::{CommandStatus, Lead, Priority};

/// OpenAPI document for the Uncodie API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Uncodie Sales API",
        version = "0.3.0",
        description = "AI sales team: lead follow-up, generation and selection agents, team notifications and command callbacks",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(name = "Uncodie", url = "https://uncodie.com")
    ),
    servers(
        (url = "https://api.uncodie.com", description = "Production"),
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Notifications", description = "Transactional emails and in-app notifications for site teams"),
        (name = "Agents", description = "Sales agent workflows"),
        (name = "Robots", description = "Remote robot instance assistant"),
        (name = "Commands", description = "Agent framework command callbacks and lookups"),
        (name = "Health", description = "Liveness and readiness probes")
    ),
    paths(
        // === Notification Routes ===
        notifications::lead_assignment,
        notifications::new_campaigns,
        notifications::new_content,
        notifications::quota_error,

        // === Agent Routes ===
        agents::lead_follow_up,
        agents::lead_generation,
        agents::lead_selection,

        // === Robot Routes ===
        robots::instance_assistant,

        // === Command Routes ===
        commands::completion,
        commands::get_command,

        // === Health Routes ===
        health::ping,
        health::liveness,
        health::readiness,
    ),
    components(schemas(
        // Errors
        ApiError, ErrorCode, ErrorEnvelope, FieldError,

        // Notifications
        LeadAssignmentRequest, LeadAssignmentResponse, AssigneeSummary, EmailsSent,
        NewCampaignsRequest, NewContentRequest, DigestEntry, DigestResponse,
        QuotaErrorRequest, QuotaErrorResponse, TeamNotifyReport,

        // Agents
        LeadFollowUpBody, LeadGenerationBody, LeadSelectionBody, RobotAssistantBody,
        FollowUpOutcome, CommandIds, ChannelCorrection, LeadGenerationOutcome,
        LeadSelection, LeadSelectionOutcome, AssistantOutcome,

        // Commands
        CompletionCallback, CommandAccepted, CommandResponse, CommandStatus,

        // Domain
        Lead, Priority,

        // Health
        HealthResponse, HealthStatus, HealthDetails, ComponentHealth,
    ))
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Pretty-printed JSON document.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
