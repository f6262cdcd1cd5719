//! Lead selection.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uncodie_commands::{extract_result, CommandRequest, ResultContract, SelectedLeads};
use uncodie_context::lead_selection_context;
use uncodie_core::{agent_roles, EntityId, Lead, LeadFilter, Priority, UncodieResult};

use crate::{tasks, SalesAgents};

#[derive(Debug, Clone, PartialEq)]
pub struct LeadSelectionRequest {
    pub site_id: EntityId,
    pub segment_id: Option<EntityId>,
    pub status: Option<String>,
    pub limit: i64,
    pub agent_id: Option<EntityId>,
    pub user_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LeadSelection {
    pub lead: Lead,
    pub reason: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LeadSelectionOutcome {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub site_id: EntityId,
    /// `None` when there were no candidates and nothing was submitted.
    pub command_id: Option<String>,
    pub candidates: usize,
    pub selected: Vec<LeadSelection>,
    /// Selections naming leads outside the candidate set, or no lead at all.
    pub discarded: usize,
}

impl SalesAgents {
    /// Ask the sales agent which candidate leads to work next.
    #[tracing::instrument(skip(self, cancel), fields(site_id = %request.site_id))]
    pub async fn select_leads(
        &self,
        request: LeadSelectionRequest,
        cancel: &CancellationToken,
    ) -> UncodieResult<LeadSelectionOutcome> {
        let site = self.require_site(request.site_id).await?;
        let segment = self.target_segment(site.id, request.segment_id).await?;

        // Without explicit filters only unassigned leads are candidates.
        let filter = LeadFilter {
            unassigned_only: request.status.is_none() && request.segment_id.is_none(),
            status: request.status.clone(),
            segment_id: request.segment_id,
            limit: request.limit,
        };
        let candidates = self.store.leads_for_selection(site.id, &filter).await?;
        if candidates.is_empty() {
            tracing::info!("No candidate leads, nothing to select");
            return Ok(LeadSelectionOutcome {
                site_id: site.id,
                command_id: None,
                candidates: 0,
                selected: Vec::new(),
                discarded: 0,
            });
        }

        let agent = self
            .resolve_agent(site.id, request.agent_id, agent_roles::SALES)
            .await?;
        let limit = usize::try_from(request.limit).unwrap_or(candidates.len());

        let command = CommandRequest::builder(tasks::LEAD_SELECTION, site.id)
            .description(format!("Select leads among {} candidates", candidates.len()))
            .user_id(request.user_id.or(Some(site.user_id)))
            .agent_id(agent.id)
            .context(lead_selection_context(&site, &candidates, segment.as_ref(), limit))
            .target(SelectedLeads::target(json!([{
                "lead_id": "candidate lead id",
                "reason": "why this lead now",
                "priority": "low | medium | high | urgent"
            }])))
            .build();

        let (command_id, completion) = self.waiter.submit_and_wait(&command, cancel).await?;
        let snapshot = completion.into_completed(&command_id)?;
        let SelectedLeads(picks) = extract_result(&snapshot)?;

        let total = candidates.len();
        let mut by_id: HashMap<EntityId, Lead> =
            candidates.into_iter().map(|l| (l.id, l)).collect();
        let mut selected = Vec::new();
        let mut discarded = 0;
        for pick in picks {
            let priority = pick.priority().unwrap_or_default();
            match pick.lead_uuid().and_then(|id| by_id.remove(&id)) {
                Some(lead) => selected.push(LeadSelection {
                    lead,
                    reason: pick.reason,
                    priority,
                }),
                None => {
                    tracing::warn!(lead_id = %pick.lead_id, "Discarding selection outside the candidates");
                    discarded += 1;
                }
            }
        }

        tracing::info!(%command_id, selected = selected.len(), discarded, "Lead selection finished");
        Ok(LeadSelectionOutcome {
            site_id: site.id,
            command_id: Some(command_id),
            candidates: total,
            selected,
            discarded,
        })
    }
}
