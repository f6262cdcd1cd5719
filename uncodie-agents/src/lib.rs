//! Uncodie Agents - Sales Workflows
//!
//! Each workflow loads what it needs from the [`SalesStore`], builds a prompt
//! context, submits a command to the agent framework, waits for it, extracts
//! a typed result and persists or returns it.
//!
//! Errors are [`UncodieError`]s: missing rows surface as
//! `StorageError::NotFound` naming the entity, command problems as
//! `CommandError` carrying the command id.

pub mod assistant;
pub mod channels;
pub mod follow_up;
pub mod lead_generation;
pub mod lead_selection;

pub use assistant::{AssistantOutcome, AssistantRequest, DEFAULT_ROBOT_PROVIDER};
pub use channels::{
    filter_and_correct_message_channel, is_channel_usable, ChannelCorrection, ChannelDecision,
};
pub use follow_up::{CommandIds, FollowUpOutcome, FollowUpRequest};
pub use lead_generation::{LeadGenerationOutcome, LeadGenerationRequest};
pub use lead_selection::{LeadSelection, LeadSelectionOutcome, LeadSelectionRequest};

use std::sync::Arc;

use uncodie_commands::CompletionWaiter;
use uncodie_core::{Agent, EntityId, Segment, Site, StorageError, UncodieResult, ValidationError};
use uncodie_storage::SalesStore;

/// Task names submitted to the agent framework.
pub mod tasks {
    pub const LEAD_FOLLOW_UP: &str = "lead_follow_up";
    pub const LEAD_FOLLOW_UP_COPYWRITING: &str = "lead_follow_up_copywriting";
    pub const LEAD_GENERATION: &str = "lead_generation";
    pub const LEAD_SELECTION: &str = "lead_selection";
    pub const ROBOT_ASSISTANT: &str = "robot_assistant";
}

/// Settings shared by every workflow.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Robot SDK provider named in assistant contexts.
    pub robot_provider: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            robot_provider: DEFAULT_ROBOT_PROVIDER.to_string(),
        }
    }
}

/// Entry point for the sales workflows.
#[derive(Clone)]
pub struct SalesAgents {
    store: Arc<dyn SalesStore>,
    waiter: CompletionWaiter,
    settings: WorkflowSettings,
}

impl std::fmt::Debug for SalesAgents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesAgents")
            .field("waiter", &self.waiter)
            .field("settings", &self.settings)
            .finish()
    }
}

impl SalesAgents {
    pub fn new(store: Arc<dyn SalesStore>, waiter: CompletionWaiter, settings: WorkflowSettings) -> Self {
        Self {
            store,
            waiter,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    async fn require_site(&self, site_id: EntityId) -> UncodieResult<Site> {
        self.store
            .site_get(site_id)
            .await?
            .ok_or_else(|| StorageError::NotFound { entity: "Site", id: site_id }.into())
    }

    /// The explicit agent, or the newest active agent with `role`.
    async fn resolve_agent(
        &self,
        site_id: EntityId,
        explicit: Option<EntityId>,
        role: &str,
    ) -> UncodieResult<Agent> {
        match explicit {
            Some(agent_id) => {
                let agent = self
                    .store
                    .agent_get(agent_id)
                    .await?
                    .ok_or(StorageError::NotFound { entity: "Agent", id: agent_id })?;
                if agent.site_id != site_id {
                    return Err(ValidationError::SiteMismatch {
                        entity: "Agent",
                        id: agent_id,
                        site_id,
                    }
                    .into());
                }
                Ok(agent)
            }
            None => self
                .store
                .active_agent_for_role(site_id, role)
                .await?
                .ok_or_else(|| StorageError::NotFound { entity: "Agent", id: site_id }.into()),
        }
    }

    /// The requested segment, checked against the site.
    async fn target_segment(
        &self,
        site_id: EntityId,
        segment_id: Option<EntityId>,
    ) -> UncodieResult<Option<Segment>> {
        let Some(segment_id) = segment_id else {
            return Ok(None);
        };
        let segment = self
            .store
            .segment_get(segment_id)
            .await?
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "segment_id".to_string(),
                reason: format!("segment {} does not exist", segment_id),
            })?;
        if segment.site_id != site_id {
            return Err(ValidationError::SiteMismatch {
                entity: "Segment",
                id: segment_id,
                site_id,
            }
            .into());
        }
        Ok(Some(segment))
    }
}
