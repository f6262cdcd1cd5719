//! Lead generation.

use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uncodie_commands::{extract_result, CommandRequest, GeneratedLead, GeneratedLeads, ResultContract};
use uncodie_context::{lead_generation_context, LeadGenerationInput};
use uncodie_core::{agent_roles, lead_status, EntityId, Lead, NewLead, UncodieResult};

use crate::{tasks, SalesAgents};

/// Origin recorded on generated leads.
pub const LEAD_GENERATION_ORIGIN: &str = "lead_generation";

#[derive(Debug, Clone, PartialEq)]
pub struct LeadGenerationRequest {
    pub site_id: EntityId,
    pub segment_id: Option<EntityId>,
    pub max_leads: usize,
    pub agent_id: Option<EntityId>,
    pub user_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LeadGenerationOutcome {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub site_id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub segment_id: Option<EntityId>,
    pub command_id: String,
    pub leads: Vec<Lead>,
    /// Proposals without a name or contact, or beyond `max_leads`.
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl SalesAgents {
    /// Ask the sales agent for new leads and insert them.
    #[tracing::instrument(skip(self, cancel), fields(site_id = %request.site_id))]
    pub async fn generate_leads(
        &self,
        request: LeadGenerationRequest,
        cancel: &CancellationToken,
    ) -> UncodieResult<LeadGenerationOutcome> {
        let site = self.require_site(request.site_id).await?;
        let segment = self.target_segment(site.id, request.segment_id).await?;
        let agent = self
            .resolve_agent(site.id, request.agent_id, agent_roles::SALES)
            .await?;

        let settings = self.store.site_settings_get(site.id).await?;
        let segments = self.store.segments_for_site(site.id).await?;
        let existing_leads = self.store.lead_count_for_site(site.id).await?;

        let context = lead_generation_context(LeadGenerationInput {
            site: &site,
            settings: settings.as_ref(),
            segments: &segments,
            target_segment: segment.as_ref(),
            existing_leads,
            max_leads: request.max_leads,
        });
        let command = CommandRequest::builder(tasks::LEAD_GENERATION, site.id)
            .description(format!("Generate up to {} leads", request.max_leads))
            .user_id(request.user_id.or(Some(site.user_id)))
            .agent_id(agent.id)
            .context(context)
            .target(GeneratedLeads::target(json!([{
                "name": "full name",
                "email": "optional email",
                "phone": "optional phone",
                "company": "optional company",
                "position": "optional position",
                "notes": "why this lead fits"
            }])))
            .metadata("max_leads", json!(request.max_leads))
            .build();

        let (command_id, completion) = self.waiter.submit_and_wait(&command, cancel).await?;
        let snapshot = completion.into_completed(&command_id)?;
        let GeneratedLeads(proposed) = extract_result(&snapshot)?;

        let total = proposed.len();
        let usable: Vec<GeneratedLead> = proposed
            .into_iter()
            .filter(GeneratedLead::is_usable)
            .take(request.max_leads)
            .collect();
        let skipped = total - usable.len();

        let mut leads = Vec::with_capacity(usable.len());
        let mut errors = Vec::new();
        for proposal in usable {
            let new_lead = NewLead {
                site_id: site.id,
                user_id: request.user_id.or(Some(site.user_id)),
                name: proposal.name.trim().to_string(),
                email: non_blank(proposal.email),
                phone: non_blank(proposal.phone),
                company: non_blank(proposal.company),
                position: non_blank(proposal.position),
                status: lead_status::NEW.to_string(),
                segment_id: segment.as_ref().map(|s| s.id),
                origin: LEAD_GENERATION_ORIGIN.to_string(),
                notes: non_blank(proposal.notes),
            };
            match self.store.lead_insert(&new_lead).await {
                Ok(lead) => leads.push(lead),
                Err(e) => {
                    tracing::warn!(error = %e, name = %new_lead.name, "Generated lead not stored");
                    errors.push(format!("{}: {}", new_lead.name, e));
                }
            }
        }

        tracing::info!(
            %command_id,
            inserted = leads.len(),
            skipped,
            failed = errors.len(),
            "Lead generation finished"
        );
        Ok(LeadGenerationOutcome {
            site_id: site.id,
            segment_id: segment.map(|s| s.id),
            command_id,
            leads,
            skipped,
            errors,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
