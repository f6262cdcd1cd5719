//! Uncodie Storage - Store Trait and Mock Implementation
//!
//! Defines the async abstraction over the relational store (Supabase
//! Postgres). The Postgres implementation lives in `uncodie-api::db`; the
//! in-memory `MockStore` backs the route tests.
//!
//! Lookups return `StorageResult<Option<T>>`: `Ok(None)` means the row does
//! not exist, `Err` means the query itself failed.

pub mod mock;

pub use mock::MockStore;

use async_trait::async_trait;
use uncodie_core::{
    Agent, Campaign, Channel, Content, Conversation, ConversationHistory, EntityId, Lead,
    LeadFilter, Message, NewLead, NewMessage, NewNotification, NewTask, Profile, RemoteInstance,
    Segment, Site, SiteSettings, StorageResult, Task, TeamMember, TeamMemberStats,
};

/// Async store trait for every table the sales workflows touch.
#[async_trait]
pub trait SalesStore: Send + Sync {
    // ========================================================================
    // LEADS
    // ========================================================================

    /// Get a lead by ID.
    async fn lead_get(&self, id: EntityId) -> StorageResult<Option<Lead>>;

    /// Set `leads.assignee_id` and return the updated row.
    async fn lead_update_assignee(
        &self,
        id: EntityId,
        assignee_id: EntityId,
    ) -> StorageResult<Lead>;

    /// Insert a new lead.
    async fn lead_insert(&self, lead: &NewLead) -> StorageResult<Lead>;

    /// Candidate leads for selection, newest first.
    async fn leads_for_selection(
        &self,
        site_id: EntityId,
        filter: &LeadFilter,
    ) -> StorageResult<Vec<Lead>>;

    /// Number of leads a site already has.
    async fn lead_count_for_site(&self, site_id: EntityId) -> StorageResult<i64>;

    // ========================================================================
    // SITES AND TEAM
    // ========================================================================

    async fn site_get(&self, id: EntityId) -> StorageResult<Option<Site>>;

    async fn site_settings_get(&self, site_id: EntityId) -> StorageResult<Option<SiteSettings>>;

    async fn profile_get(&self, user_id: EntityId) -> StorageResult<Option<Profile>>;

    /// Site owner plus members.
    async fn team_members(&self, site_id: EntityId) -> StorageResult<Vec<TeamMember>>;

    async fn team_member_stats(&self, site_id: EntityId) -> StorageResult<Vec<TeamMemberStats>>;

    // ========================================================================
    // AGENTS AND SEGMENTS
    // ========================================================================

    async fn agent_get(&self, id: EntityId) -> StorageResult<Option<Agent>>;

    /// Most recently created active agent with the given role.
    async fn active_agent_for_role(
        &self,
        site_id: EntityId,
        role: &str,
    ) -> StorageResult<Option<Agent>>;

    async fn segment_get(&self, id: EntityId) -> StorageResult<Option<Segment>>;

    async fn segments_for_site(&self, site_id: EntityId) -> StorageResult<Vec<Segment>>;

    // ========================================================================
    // CONVERSATIONS, MESSAGES, TASKS
    // ========================================================================

    /// Return the active conversation for `(lead_id, channel)`, creating it
    /// when none exists.
    async fn conversation_find_or_create(
        &self,
        site_id: EntityId,
        lead_id: EntityId,
        channel: Channel,
        agent_id: Option<EntityId>,
    ) -> StorageResult<Conversation>;

    /// Most recent conversations of a lead, newest first.
    async fn conversations_for_lead(
        &self,
        lead_id: EntityId,
        limit: i64,
    ) -> StorageResult<Vec<Conversation>>;

    /// Most recent messages of a conversation, oldest first.
    async fn messages_for_conversation(
        &self,
        conversation_id: EntityId,
        limit: i64,
    ) -> StorageResult<Vec<Message>>;

    async fn message_insert(&self, message: &NewMessage) -> StorageResult<Message>;

    async fn task_insert(&self, task: &NewTask) -> StorageResult<Task>;

    /// Conversations of a lead with their recent messages.
    async fn conversation_history(
        &self,
        lead_id: EntityId,
        conversation_limit: i64,
        message_limit: i64,
    ) -> StorageResult<Vec<ConversationHistory>> {
        let conversations = self.conversations_for_lead(lead_id, conversation_limit).await?;
        let mut history = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let messages = self
                .messages_for_conversation(conversation.id, message_limit)
                .await?;
            history.push(ConversationHistory {
                conversation,
                messages,
            });
        }
        Ok(history)
    }

    // ========================================================================
    // CAMPAIGNS, CONTENT, NOTIFICATIONS
    // ========================================================================

    /// Campaigns of a site with the given status, optionally restricted to ids.
    async fn campaigns_by_status(
        &self,
        site_id: EntityId,
        status: &str,
        ids: Option<&[EntityId]>,
    ) -> StorageResult<Vec<Campaign>>;

    /// Content of a site with the given status, optionally restricted to ids.
    async fn contents_by_status(
        &self,
        site_id: EntityId,
        status: &str,
        ids: Option<&[EntityId]>,
    ) -> StorageResult<Vec<Content>>;

    /// Insert an in-app notification, returning its id.
    async fn notification_insert(&self, notification: &NewNotification)
        -> StorageResult<EntityId>;

    // ========================================================================
    // ROBOTS
    // ========================================================================

    async fn remote_instance_get(&self, id: EntityId) -> StorageResult<Option<RemoteInstance>>;

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Cheap round trip used by readiness checks.
    async fn ping(&self) -> StorageResult<()>;
}
