//! Two-phase lead follow-up.
//!
//! Phase 1 asks the sales agent for a draft. The draft's channel is checked
//! against the site's channels and the lead's contact data. Phase 2, when
//! the site has a copywriter agent, polishes the wording; it never changes
//! the channel and its failure only means the phase 1 draft is used as is.
//! The result is stored as a pending assistant message plus a follow-up
//! task.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uncodie_commands::{extract_result, CommandRequest, FollowUpContent, RefinedContent, ResultContract};
use uncodie_context::{copywriter_context, follow_up_context, FollowUpInput};
use uncodie_core::{
    agent_roles, Agent, Channel, EntityId, Lead, MessageRole, NewMessage, NewTask, Priority, Site,
    StorageError, UncodieResult, ValidationError,
};

use crate::channels::{filter_and_correct_message_channel, ChannelCorrection, ChannelDecision};
use crate::{tasks, SalesAgents};

const HISTORY_CONVERSATIONS: i64 = 5;
const HISTORY_MESSAGES: i64 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct FollowUpRequest {
    pub site_id: EntityId,
    pub lead_id: EntityId,
    pub agent_id: Option<EntityId>,
    pub user_id: Option<EntityId>,
}

/// Ids of the commands behind a follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CommandIds {
    pub sales: String,
    /// `None` when phase 2 was not submitted or did not complete.
    pub copywriter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FollowUpOutcome {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub site_id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub lead_id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: EntityId,
    /// Final content, absent when the message was dropped.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub content: Option<FollowUpContent>,
    pub refined: bool,
    pub channel_correction: Option<ChannelCorrection>,
    pub dropped_reason: Option<String>,
    pub command_ids: CommandIds,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub conversation_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub message_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub task_id: Option<EntityId>,
}

impl SalesAgents {
    /// Draft, correct, refine and store the next follow-up for a lead.
    #[tracing::instrument(skip(self, cancel), fields(site_id = %request.site_id, lead_id = %request.lead_id))]
    pub async fn lead_follow_up(
        &self,
        request: FollowUpRequest,
        cancel: &CancellationToken,
    ) -> UncodieResult<FollowUpOutcome> {
        let site = self.require_site(request.site_id).await?;
        let lead = self
            .store
            .lead_get(request.lead_id)
            .await?
            .ok_or(StorageError::NotFound {
                entity: "Lead",
                id: request.lead_id,
            })?;
        if lead.site_id != site.id {
            return Err(ValidationError::SiteMismatch {
                entity: "Lead",
                id: lead.id,
                site_id: site.id,
            }
            .into());
        }
        let agent = self
            .resolve_agent(site.id, request.agent_id, agent_roles::SALES)
            .await?;

        let channels = self
            .store
            .site_settings_get(site.id)
            .await?
            .map(|s| s.channels)
            .unwrap_or_default();
        let segment = match lead.segment_id {
            Some(segment_id) => self.store.segment_get(segment_id).await?,
            None => None,
        };
        let history = self
            .store
            .conversation_history(lead.id, HISTORY_CONVERSATIONS, HISTORY_MESSAGES)
            .await?;
        let team = self.store.team_member_stats(site.id).await?;

        // Phase 1
        let context = follow_up_context(FollowUpInput {
            site: &site,
            lead: &lead,
            segment: segment.as_ref(),
            channels: &channels,
            history: &history,
            team: &team,
            agent: &agent,
        });
        let command = CommandRequest::builder(tasks::LEAD_FOLLOW_UP, site.id)
            .description(format!("Follow-up message for lead {}", lead.name))
            .user_id(request.user_id.or(Some(site.user_id)))
            .agent_id(agent.id)
            .context(context)
            .target(FollowUpContent::target(json!({
                "channel": "email | whatsapp | notification | web",
                "subject": "optional subject line",
                "message": "message body",
                "strategy": "short note on the approach"
            })))
            .metadata("lead_id", json!(lead.id))
            .build();

        let (sales_id, completion) = self.waiter.submit_and_wait(&command, cancel).await?;
        let snapshot = completion.into_completed(&sales_id)?;
        let draft: FollowUpContent = extract_result(&snapshot)?;

        let mut outcome = FollowUpOutcome {
            site_id: site.id,
            lead_id: lead.id,
            agent_id: agent.id,
            content: None,
            refined: false,
            channel_correction: None,
            dropped_reason: None,
            command_ids: CommandIds {
                sales: sales_id,
                copywriter: None,
            },
            conversation_id: None,
            message_id: None,
            task_id: None,
        };

        let (draft, correction) = match filter_and_correct_message_channel(draft, &lead, &channels) {
            ChannelDecision::Send {
                content,
                correction,
            } => (content, correction),
            ChannelDecision::Dropped { reason } => {
                tracing::warn!(%reason, "Follow-up dropped, no channel can reach the lead");
                outcome.dropped_reason = Some(reason);
                return Ok(outcome);
            }
        };
        if let Some(correction) = &correction {
            tracing::info!(
                original = %correction.original,
                corrected = %correction.corrected,
                "Follow-up channel corrected"
            );
        }

        // Phase 2
        let (content, copywriter_id) = self
            .refine_with_copywriter(&site, &lead, &draft, request.user_id, cancel)
            .await;
        outcome.refined = copywriter_id.is_some();
        outcome.command_ids.copywriter = copywriter_id;
        outcome.channel_correction = correction;

        self.persist_follow_up(&site, &lead, &agent, &content, request.user_id, &mut outcome)
            .await?;
        outcome.content = Some(content);
        Ok(outcome)
    }

    /// Returns the content to store and the copywriter command id when the
    /// rewrite completed. Never fails.
    async fn refine_with_copywriter(
        &self,
        site: &Site,
        lead: &Lead,
        draft: &FollowUpContent,
        user_id: Option<EntityId>,
        cancel: &CancellationToken,
    ) -> (FollowUpContent, Option<String>) {
        let copywriter = match self
            .store
            .active_agent_for_role(site.id, agent_roles::COPYWRITER)
            .await
        {
            Ok(Some(agent)) => agent,
            Ok(None) => return (draft.clone(), None),
            Err(e) => {
                tracing::warn!(error = %e, "Copywriter lookup failed, keeping draft");
                return (draft.clone(), None);
            }
        };

        let command = CommandRequest::builder(tasks::LEAD_FOLLOW_UP_COPYWRITING, site.id)
            .description(format!("Refine follow-up for lead {}", lead.name))
            .user_id(user_id.or(Some(site.user_id)))
            .agent_id(copywriter.id)
            .context(copywriter_context(draft, lead, site))
            .target(RefinedContent::target(json!({
                "subject": "optional subject line",
                "message": "refined message body"
            })))
            .metadata("lead_id", json!(lead.id))
            .build();

        let (command_id, completion) = match self.waiter.submit_and_wait(&command, cancel).await {
            Ok(submitted) => submitted,
            Err(e) => {
                tracing::warn!(error = %e, "Copywriter submission failed, keeping draft");
                return (draft.clone(), None);
            }
        };

        let refined = completion
            .into_completed(&command_id)
            .and_then(|snapshot| extract_result::<RefinedContent>(&snapshot));
        match refined {
            Ok(refined) if !refined.message.trim().is_empty() => {
                if refined.channel.is_some_and(|c| c != draft.channel) {
                    tracing::debug!(%command_id, "Ignoring channel change from copywriter");
                }
                let merged = FollowUpContent {
                    channel: draft.channel,
                    subject: refined.subject.or_else(|| draft.subject.clone()),
                    message: refined.message,
                    strategy: draft.strategy.clone(),
                };
                (merged, Some(command_id))
            }
            Ok(_) => {
                tracing::warn!(%command_id, "Copywriter returned an empty message, keeping draft");
                (draft.clone(), None)
            }
            Err(e) => {
                tracing::warn!(%command_id, error = %e, "Copywriter did not deliver, keeping draft");
                (draft.clone(), None)
            }
        }
    }

    async fn persist_follow_up(
        &self,
        site: &Site,
        lead: &Lead,
        agent: &Agent,
        content: &FollowUpContent,
        user_id: Option<EntityId>,
        outcome: &mut FollowUpOutcome,
    ) -> UncodieResult<()> {
        let conversation = self
            .store
            .conversation_find_or_create(site.id, lead.id, content.channel, Some(agent.id))
            .await?;

        let custom_data = json!({
            "status": "pending",
            "channel": content.channel,
            "subject": content.subject,
            "strategy": content.strategy,
            "command_ids": outcome.command_ids,
            "channel_correction": outcome.channel_correction,
            "refined": outcome.refined,
        });
        let message = self
            .store
            .message_insert(&NewMessage {
                conversation_id: conversation.id,
                lead_id: Some(lead.id),
                agent_id: Some(agent.id),
                role: MessageRole::Assistant,
                content: content.message.clone(),
                custom_data,
            })
            .await?;

        let task = self
            .store
            .task_insert(&NewTask {
                site_id: site.id,
                lead_id: lead.id,
                user_id: lead.assignee_id.or(user_id),
                title: format!("Follow up with {}", lead.name),
                description: Some(task_description(content)),
                task_type: "follow_up".to_string(),
                status: "pending".to_string(),
                priority: Priority::Medium,
                scheduled_date: Some(Utc::now()),
            })
            .await?;

        tracing::info!(
            conversation_id = %conversation.id,
            message_id = %message.id,
            task_id = %task.id,
            channel = %content.channel,
            "Follow-up stored"
        );
        outcome.conversation_id = Some(conversation.id);
        outcome.message_id = Some(message.id);
        outcome.task_id = Some(task.id);
        Ok(())
    }
}

fn task_description(content: &FollowUpContent) -> String {
    let via = match content.channel {
        Channel::Email => "Send email",
        Channel::Whatsapp => "Send WhatsApp message",
        Channel::Notification => "Send notification",
        Channel::Web => "Reply on website chat",
    };
    match content.subject.as_deref() {
        Some(subject) => format!("{}: {}", via, subject),
        None => via.to_string(),
    }
}
