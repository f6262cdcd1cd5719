//! Sales Agent REST API Routes
//!
//! Thin wrappers around the [`SalesAgents`] workflows. Each request owns a
//! cancellation token that fires when the handler future is dropped, so a
//! client hanging up or the request timeout stops any pending command wait.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    routing::post,
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use uncodie_agents::{
    FollowUpOutcome, FollowUpRequest, LeadGenerationOutcome, LeadGenerationRequest,
    LeadSelectionOutcome, LeadSelectionRequest, SalesAgents,
};

use crate::{
    error::ApiResult,
    state::AppState,
    types::{ApiResponse, LeadFollowUpBody, LeadGenerationBody, LeadSelectionBody},
    validation::FieldErrors,
};

const MAX_LEADS_RANGE: (i64, i64, i64) = (1, 50, 10);
const SELECTION_LIMIT_RANGE: (i64, i64, i64) = (1, 100, 25);

fn parse_follow_up(body: LeadFollowUpBody) -> ApiResult<FollowUpRequest> {
    let mut errors = FieldErrors::new();
    let site_id = errors.require_uuid("site_id", body.site_id.as_deref());
    let lead_id = errors.require_uuid("lead_id", body.lead_id.as_deref());
    let agent_id = errors.optional_uuid("agent_id", body.agent_id.as_deref());
    let user_id = errors.optional_uuid("user_id", body.user_id.as_deref());
    errors.finish(|| {
        Some(FollowUpRequest {
            site_id: site_id?,
            lead_id: lead_id?,
            agent_id,
            user_id,
        })
    })
}

fn parse_generation(body: LeadGenerationBody) -> ApiResult<LeadGenerationRequest> {
    let mut errors = FieldErrors::new();
    let site_id = errors.require_uuid("site_id", body.site_id.as_deref());
    let segment_id = errors.optional_uuid("segment_id", body.segment_id.as_deref());
    let (min, max, default) = MAX_LEADS_RANGE;
    let max_leads = errors.bounded("max_leads", body.max_leads, min, max, default);
    let agent_id = errors.optional_uuid("agent_id", body.agent_id.as_deref());
    let user_id = errors.optional_uuid("user_id", body.user_id.as_deref());
    errors.finish(|| {
        Some(LeadGenerationRequest {
            site_id: site_id?,
            segment_id,
            max_leads: usize::try_from(max_leads).ok()?,
            agent_id,
            user_id,
        })
    })
}

fn parse_selection(body: LeadSelectionBody) -> ApiResult<LeadSelectionRequest> {
    let mut errors = FieldErrors::new();
    let site_id = errors.require_uuid("site_id", body.site_id.as_deref());
    let segment_id = errors.optional_uuid("segment_id", body.segment_id.as_deref());
    let (min, max, default) = SELECTION_LIMIT_RANGE;
    let limit = errors.bounded("limit", body.limit, min, max, default);
    let agent_id = errors.optional_uuid("agent_id", body.agent_id.as_deref());
    let user_id = errors.optional_uuid("user_id", body.user_id.as_deref());
    let status = body
        .status
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    errors.finish(|| {
        Some(LeadSelectionRequest {
            site_id: site_id?,
            segment_id,
            status,
            limit,
            agent_id,
            user_id,
        })
    })
}

/// POST /api/agents/sales/leadFollowUp
#[utoipa::path(
    post,
    path = "/api/agents/sales/leadFollowUp",
    tag = "Agents",
    request_body = LeadFollowUpBody,
    responses(
        (status = 200, description = "Follow-up drafted and stored, or dropped with a reason", body = FollowUpOutcome),
        (status = 400, description = "Invalid request", body = crate::error::ErrorEnvelope),
        (status = 404, description = "Site, lead or agent not found", body = crate::error::ErrorEnvelope),
        (status = 500, description = "Command failed or did not complete", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn lead_follow_up(
    State(agents): State<SalesAgents>,
    payload: Result<Json<LeadFollowUpBody>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = payload?;
    let request = parse_follow_up(body)?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let outcome = agents.lead_follow_up(request, &cancel).await?;
    Ok(ApiResponse::ok(outcome))
}

/// POST /api/agents/sales/leadGeneration
#[utoipa::path(
    post,
    path = "/api/agents/sales/leadGeneration",
    tag = "Agents",
    request_body = LeadGenerationBody,
    responses(
        (status = 200, description = "Leads generated and stored", body = LeadGenerationOutcome),
        (status = 207, description = "Some generated leads could not be stored", body = LeadGenerationOutcome),
        (status = 400, description = "Invalid request", body = crate::error::ErrorEnvelope),
        (status = 404, description = "Site or agent not found", body = crate::error::ErrorEnvelope),
        (status = 500, description = "Command failed or did not complete", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn lead_generation(
    State(agents): State<SalesAgents>,
    payload: Result<Json<LeadGenerationBody>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = payload?;
    let request = parse_generation(body)?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let outcome = agents.generate_leads(request, &cancel).await?;
    let errors = outcome.errors.clone();
    Ok(ApiResponse::partial(outcome, &errors))
}

/// POST /api/agents/sales/leadSelection
#[utoipa::path(
    post,
    path = "/api/agents/sales/leadSelection",
    tag = "Agents",
    request_body = LeadSelectionBody,
    responses(
        (status = 200, description = "Leads ranked for outreach", body = LeadSelectionOutcome),
        (status = 400, description = "Invalid request", body = crate::error::ErrorEnvelope),
        (status = 404, description = "Site or agent not found", body = crate::error::ErrorEnvelope),
        (status = 500, description = "Command failed or did not complete", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn lead_selection(
    State(agents): State<SalesAgents>,
    payload: Result<Json<LeadSelectionBody>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = payload?;
    let request = parse_selection(body)?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let outcome = agents.select_leads(request, &cancel).await?;
    Ok(ApiResponse::ok(outcome))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/leadFollowUp", post(lead_follow_up))
        .route("/leadGeneration", post(lead_generation))
        .route("/leadSelection", post(lead_selection))
}
