//! Notification REST API Routes
//!
//! Each route loads the rows it needs, renders an email, sends it and fans
//! the news out to the site team. Steps after the first write do not abort
//! the request; their failures are returned in `errors` with a 207.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use uncodie_core::{EntityId, Priority, Site, Timestamp};

use crate::{
    email::EmailMessage,
    error::{ApiError, ApiResult, ErrorCode},
    notify::TeamNotification,
    state::AppState,
    templates::{self, DigestEmail, DigestItem, LeadAssignmentEmail, LeadSummary, QuotaErrorEmail},
    types::{
        ApiResponse, AssigneeSummary, DigestEntry, DigestResponse, EmailsSent,
        LeadAssignmentRequest, LeadAssignmentResponse, NewCampaignsRequest, NewContentRequest,
        QuotaErrorRequest, QuotaErrorResponse,
    },
    validation::FieldErrors,
};

const DEFAULT_CAMPAIGN_STATUS: &str = "pending_review";
const DEFAULT_CONTENT_STATUS: &str = "draft";

// ============================================================================
// LEAD ASSIGNMENT
// ============================================================================

struct AssignmentInput {
    lead_id: EntityId,
    assignee_id: EntityId,
    brief: String,
    next_steps: Vec<String>,
    priority: Priority,
    due_date: Option<Timestamp>,
    additional_context: Option<String>,
    include_team: bool,
}

fn parse_due_date(raw: &str) -> Option<Timestamp> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_assignment(req: LeadAssignmentRequest) -> ApiResult<AssignmentInput> {
    let mut errors = FieldErrors::new();
    let lead_id = errors.require_uuid("lead_id", req.lead_id.as_deref());
    let assignee_id = errors.require_uuid("assignee_id", req.assignee_id.as_deref());
    let brief = errors.require_text("brief", req.brief.as_deref());

    let next_steps: Vec<String> = req
        .next_steps
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if next_steps.is_empty() {
        errors.add("next_steps", "must contain at least one step");
    }

    let priority = match req.priority.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        None => Priority::default(),
        Some(raw) => raw.parse::<Priority>().unwrap_or_else(|e| {
            errors.add("priority", e.to_string());
            Priority::default()
        }),
    };

    let due_date = match req.due_date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        None => None,
        Some(raw) => {
            let parsed = parse_due_date(raw);
            if parsed.is_none() {
                errors.add("due_date", "must be an RFC 3339 timestamp or YYYY-MM-DD");
            }
            parsed
        }
    };

    errors.finish(|| {
        Some(AssignmentInput {
            lead_id: lead_id?,
            assignee_id: assignee_id?,
            brief: brief?,
            next_steps,
            priority,
            due_date,
            additional_context: req
                .additional_context
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            include_team: req.include_team_notification.unwrap_or(true),
        })
    })
}

/// POST /api/notifications/leadAssignment
#[utoipa::path(
    post,
    path = "/api/notifications/leadAssignment",
    tag = "Notifications",
    request_body = LeadAssignmentRequest,
    responses(
        (status = 200, description = "Lead assigned and everyone notified", body = LeadAssignmentResponse),
        (status = 207, description = "Lead assigned, some notifications failed", body = LeadAssignmentResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorEnvelope),
        (status = 404, description = "Lead, assignee or site not found", body = crate::error::ErrorEnvelope),
        (status = 500, description = "System error", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn lead_assignment(
    State(state): State<AppState>,
    payload: Result<Json<LeadAssignmentRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let input = parse_assignment(req)?;

    let lead = state
        .store
        .lead_get(input.lead_id)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorCode::LeadNotFound, input.lead_id))?;
    let assignee = state
        .store
        .profile_get(input.assignee_id)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorCode::AssigneeNotFound, input.assignee_id))?;
    let site = state
        .store
        .site_get(lead.site_id)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorCode::SiteNotFound, lead.site_id))?;

    let branding = &state.config.branding;
    let mut email_ctx = LeadAssignmentEmail {
        brand: branding,
        for_team: false,
        lead: LeadSummary::from(&lead),
        assignee_name: assignee.display_name().to_string(),
        site_name: site.name.clone(),
        brief: input.brief.clone(),
        next_steps: input.next_steps.clone(),
        priority: input.priority.to_string(),
        due_date: input.due_date.map(|d| d.format("%B %-d, %Y").to_string()),
        additional_context: input.additional_context.clone(),
        lead_url: format!("{}/leads/{}", branding.app_url, lead.id),
    };
    let assignee_html = templates::lead_assignment(&email_ctx)?;
    email_ctx.for_team = true;
    let team_html = templates::lead_assignment(&email_ctx)?;

    let lead = state.store.lead_update_assignee(lead.id, assignee.id).await?;
    tracing::info!(lead_id = %lead.id, assignee_id = %assignee.id, "Lead assigned");

    let mut errors = Vec::new();
    let mut emails_sent = EmailsSent::default();

    match assignee.email.as_deref().filter(|e| !e.trim().is_empty()) {
        Some(address) => {
            let message = EmailMessage::new(
                address,
                format!("New lead assigned: {}", lead.name),
                assignee_html,
            )
            .with_categories(&["lead-assignment", "transactional"])
            .with_arg("lead_id", lead.id)
            .with_arg("site_id", site.id)
            .with_arg("priority", input.priority);
            match state.email.send(&message).await {
                Ok(_) => emails_sent.assignee = 1,
                Err(e) => {
                    tracing::warn!(lead_id = %lead.id, error = %e, "Assignee email failed");
                    errors.push(format!("Failed to email assignee: {}", e));
                }
            }
        }
        None => errors.push(format!("Assignee {} has no email address", assignee.id)),
    }

    let mut notifications_created = 0;
    if input.include_team {
        let report = state
            .notifier
            .notify(
                site.id,
                &TeamNotification {
                    title: format!("Lead assigned to {}", assignee.display_name()),
                    message: format!(
                        "{} was assigned to {} with {} priority",
                        lead.name,
                        assignee.display_name(),
                        input.priority
                    ),
                    notification_type: "lead_assigned".to_string(),
                    related_entity_type: Some("lead".to_string()),
                    related_entity_id: Some(lead.id),
                    email_subject: format!(
                        "{} was assigned to {}",
                        lead.name,
                        assignee.display_name()
                    ),
                    email_html: team_html,
                    categories: vec!["lead-assignment".to_string(), "team".to_string()],
                },
                &[assignee.id],
            )
            .await;
        notifications_created = report.notifications_created;
        emails_sent.team = report.emails_sent;
        errors.extend(report.errors);
    }

    let response = LeadAssignmentResponse {
        assignee: AssigneeSummary::from(&assignee),
        lead,
        assignment_updated: true,
        emails_sent,
        notifications_created,
        errors,
    };
    let errors = response.errors.clone();
    Ok(ApiResponse::partial(response, &errors))
}

// ============================================================================
// CAMPAIGN AND CONTENT DIGESTS
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum DigestKind {
    Campaigns,
    Content,
}

impl DigestKind {
    fn notification_type(self) -> &'static str {
        match self {
            DigestKind::Campaigns => "new_campaigns",
            DigestKind::Content => "new_content",
        }
    }

    fn noun(self, count: usize) -> &'static str {
        match (self, count) {
            (DigestKind::Campaigns, 1) => "campaign",
            (DigestKind::Campaigns, _) => "campaigns",
            (DigestKind::Content, 1) => "content item",
            (DigestKind::Content, _) => "content items",
        }
    }

    fn path(self) -> &'static str {
        match self {
            DigestKind::Campaigns => "campaigns",
            DigestKind::Content => "content",
        }
    }
}

struct DigestInput {
    site_id: EntityId,
    status: String,
    ids: Option<Vec<EntityId>>,
}

fn parse_digest(
    site_id: Option<&str>,
    status: Option<&str>,
    ids: Option<&[String]>,
    ids_field: &str,
    default_status: &str,
) -> ApiResult<DigestInput> {
    let mut errors = FieldErrors::new();
    let site_id = errors.require_uuid("site_id", site_id);
    let ids = ids.map(|raw| {
        raw.iter()
            .enumerate()
            .filter_map(|(i, id)| {
                errors.require_uuid(&format!("{}[{}]", ids_field, i), Some(id.as_str()))
            })
            .collect::<Vec<_>>()
    });
    let status = status
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_status)
        .to_string();
    errors.finish(|| {
        Some(DigestInput {
            site_id: site_id?,
            status,
            ids,
        })
    })
}

async fn require_site(state: &AppState, site_id: EntityId) -> ApiResult<Site> {
    state
        .store
        .site_get(site_id)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorCode::SiteNotFound, site_id))
}

async fn send_digest(
    state: &AppState,
    kind: DigestKind,
    site: &Site,
    status: String,
    items: Vec<(EntityId, DigestItem)>,
) -> ApiResult<Response> {
    if items.is_empty() {
        tracing::debug!(site_id = %site.id, %status, kind = kind.path(), "Nothing to notify");
        return Ok(ApiResponse::ok(DigestResponse {
            site_id: site.id,
            status,
            notified: false,
            items: Vec::new(),
            notifications_created: 0,
            emails_sent: 0,
            errors: Vec::new(),
        }));
    }

    let count = items.len();
    let entries: Vec<DigestEntry> = items
        .iter()
        .map(|(id, item)| DigestEntry {
            id: *id,
            title: item.title.clone(),
        })
        .collect();
    let ctx = DigestEmail {
        brand: &state.config.branding,
        site_name: site.name.clone(),
        items: items.into_iter().map(|(_, item)| item).collect(),
        review_url: format!("{}/{}", state.config.branding.app_url, kind.path()),
    };
    let html = match kind {
        DigestKind::Campaigns => templates::campaigns_digest(&ctx)?,
        DigestKind::Content => templates::content_digest(&ctx)?,
    };

    let noun = kind.noun(count);
    let report = state
        .notifier
        .notify(
            site.id,
            &TeamNotification {
                title: format!("{} new {}", count, noun),
                message: format!("{} new {} ready for review on {}", count, noun, site.name),
                notification_type: kind.notification_type().to_string(),
                related_entity_type: Some(kind.path().to_string()),
                related_entity_id: (count == 1).then(|| entries[0].id),
                email_subject: format!("{} new {} for {}", count, noun, site.name),
                email_html: html,
                categories: vec![kind.notification_type().replace('_', "-"), "team".to_string()],
            },
            &[],
        )
        .await;

    let errors = report.errors.clone();
    Ok(ApiResponse::partial(
        DigestResponse {
            site_id: site.id,
            status,
            notified: true,
            items: entries,
            notifications_created: report.notifications_created,
            emails_sent: report.emails_sent,
            errors: report.errors,
        },
        &errors,
    ))
}

/// POST /api/notifications/newCampaigns
#[utoipa::path(
    post,
    path = "/api/notifications/newCampaigns",
    tag = "Notifications",
    request_body = NewCampaignsRequest,
    responses(
        (status = 200, description = "Team notified, or nothing matched", body = DigestResponse),
        (status = 207, description = "Some notifications failed", body = DigestResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorEnvelope),
        (status = 404, description = "Site not found", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn new_campaigns(
    State(state): State<AppState>,
    payload: Result<Json<NewCampaignsRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let input = parse_digest(
        req.site_id.as_deref(),
        req.status.as_deref(),
        req.campaign_ids.as_deref(),
        "campaign_ids",
        DEFAULT_CAMPAIGN_STATUS,
    )?;
    let site = require_site(&state, input.site_id).await?;

    let campaigns = state
        .store
        .campaigns_by_status(site.id, &input.status, input.ids.as_deref())
        .await?;
    let items = campaigns
        .into_iter()
        .map(|c| {
            (
                c.id,
                DigestItem {
                    title: c.title,
                    description: c.description,
                    content_type: None,
                },
            )
        })
        .collect();
    send_digest(&state, DigestKind::Campaigns, &site, input.status, items).await
}

/// POST /api/notifications/newContent
#[utoipa::path(
    post,
    path = "/api/notifications/newContent",
    tag = "Notifications",
    request_body = NewContentRequest,
    responses(
        (status = 200, description = "Team notified, or nothing matched", body = DigestResponse),
        (status = 207, description = "Some notifications failed", body = DigestResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorEnvelope),
        (status = 404, description = "Site not found", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn new_content(
    State(state): State<AppState>,
    payload: Result<Json<NewContentRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let input = parse_digest(
        req.site_id.as_deref(),
        req.status.as_deref(),
        req.content_ids.as_deref(),
        "content_ids",
        DEFAULT_CONTENT_STATUS,
    )?;
    let site = require_site(&state, input.site_id).await?;

    let contents = state
        .store
        .contents_by_status(site.id, &input.status, input.ids.as_deref())
        .await?;
    let items = contents
        .into_iter()
        .map(|c| {
            (
                c.id,
                DigestItem {
                    title: c.title,
                    description: c.description,
                    content_type: c.content_type,
                },
            )
        })
        .collect();
    send_digest(&state, DigestKind::Content, &site, input.status, items).await
}

// ============================================================================
// QUOTA ERRORS
// ============================================================================

/// POST /api/notifications/quotaError
#[utoipa::path(
    post,
    path = "/api/notifications/quotaError",
    tag = "Notifications",
    request_body = QuotaErrorRequest,
    responses(
        (status = 200, description = "Owner and team notified", body = QuotaErrorResponse),
        (status = 207, description = "Some notifications failed", body = QuotaErrorResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorEnvelope),
        (status = 404, description = "Site not found", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn quota_error(
    State(state): State<AppState>,
    payload: Result<Json<QuotaErrorRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let mut fields = FieldErrors::new();
    let site_id = fields.require_uuid("site_id", req.site_id.as_deref());
    let error_message = fields.require_text("error_message", req.error_message.as_deref());
    let (site_id, error_message) = fields.finish(|| Some((site_id?, error_message?)))?;
    let optional = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let provider = optional(req.provider);
    let quota_type = optional(req.quota_type);
    let command_id = optional(req.command_id);

    let site = require_site(&state, site_id).await?;
    let html = templates::quota_error(&QuotaErrorEmail {
        brand: &state.config.branding,
        site_name: site.name.clone(),
        error_message: error_message.clone(),
        provider: provider.clone(),
        quota_type: quota_type.clone(),
        command_id: command_id.clone(),
        billing_url: format!("{}/billing", state.config.branding.app_url),
    })?;
    let subject = format!("Action needed: quota reached for {}", site.name);
    let title = match &provider {
        Some(p) => format!("{} quota reached", p),
        None => "Quota reached".to_string(),
    };

    let mut errors = Vec::new();
    let mut owner_notified = false;
    let mut emails_sent = 0;
    let mut notifications_created = 0;

    match state.store.profile_get(site.user_id).await {
        Ok(Some(owner)) => {
            let owner_row = uncodie_core::NewNotification {
                site_id: site.id,
                user_id: owner.id,
                title: title.clone(),
                message: error_message.clone(),
                notification_type: "quota_error".to_string(),
                related_entity_type: Some("site".to_string()),
                related_entity_id: Some(site.id),
            };
            match state.store.notification_insert(&owner_row).await {
                Ok(_) => notifications_created += 1,
                Err(e) => errors.push(format!("Failed to create owner notification: {}", e)),
            }
            match owner.email.as_deref().filter(|e| !e.trim().is_empty()) {
                Some(address) => {
                    let mut message = EmailMessage::new(address, subject.clone(), html.clone())
                        .with_categories(&["quota-error", "transactional"])
                        .with_arg("site_id", site.id);
                    if let Some(id) = &command_id {
                        message = message.with_arg("command_id", id);
                    }
                    match state.email.send(&message).await {
                        Ok(_) => {
                            owner_notified = true;
                            emails_sent += 1;
                        }
                        Err(e) => errors.push(format!("Failed to email site owner: {}", e)),
                    }
                }
                None => errors.push("Site owner has no email address".to_string()),
            }
        }
        Ok(None) => errors.push(format!("Site owner profile {} not found", site.user_id)),
        Err(e) => errors.push(format!("Failed to load site owner: {}", e)),
    }

    let report = state
        .notifier
        .notify(
            site.id,
            &TeamNotification {
                title,
                message: error_message,
                notification_type: "quota_error".to_string(),
                related_entity_type: Some("site".to_string()),
                related_entity_id: Some(site.id),
                email_subject: subject,
                email_html: html,
                categories: vec!["quota-error".to_string(), "team".to_string()],
            },
            &[site.user_id],
        )
        .await;
    tracing::warn!(site_id = %site.id, provider = ?provider, quota_type = ?quota_type, "Quota error reported");

    notifications_created += report.notifications_created;
    emails_sent += report.emails_sent;
    errors.extend(report.errors);

    let response_errors = errors.clone();
    Ok(ApiResponse::partial(
        QuotaErrorResponse {
            site_id: site.id,
            owner_notified,
            notifications_created,
            emails_sent,
            errors,
        },
        &response_errors,
    ))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/leadAssignment", post(lead_assignment))
        .route("/newCampaigns", post(new_campaigns))
        .route("/newContent", post(new_content))
        .route("/quotaError", post(quota_error))
}
