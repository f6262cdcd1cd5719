//! In-memory mock store for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uncodie_core::{
    new_entity_id, Agent, Campaign, Channel, Content, Conversation, EntityId, Lead, LeadFilter,
    Message, NewLead, NewMessage, NewNotification, NewTask, Profile, RemoteInstance, Segment, Site,
    SiteSettings, StorageError, StorageResult, Task, TeamMember, TeamMemberStats,
};

use crate::SalesStore;

/// In-memory mock store.
///
/// Tables can be made to fail with [`MockStore::fail_table`] to exercise
/// error paths, and [`MockStore::write_count`] reports how many mutating
/// calls succeeded.
#[derive(Debug, Default, Clone)]
pub struct MockStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    leads: RwLock<HashMap<EntityId, Lead>>,
    sites: RwLock<HashMap<EntityId, Site>>,
    settings: RwLock<HashMap<EntityId, SiteSettings>>,
    profiles: RwLock<HashMap<EntityId, Profile>>,
    team: RwLock<HashMap<EntityId, Vec<TeamMember>>>,
    stats: RwLock<HashMap<EntityId, Vec<TeamMemberStats>>>,
    agents: RwLock<HashMap<EntityId, Agent>>,
    segments: RwLock<HashMap<EntityId, Segment>>,
    conversations: RwLock<HashMap<EntityId, Conversation>>,
    messages: RwLock<HashMap<EntityId, Message>>,
    tasks: RwLock<HashMap<EntityId, Task>>,
    campaigns: RwLock<HashMap<EntityId, Campaign>>,
    contents: RwLock<HashMap<EntityId, Content>>,
    notifications: RwLock<Vec<(EntityId, NewNotification)>>,
    instances: RwLock<HashMap<EntityId, RemoteInstance>>,
    failing: RwLock<HashSet<&'static str>>,
    writes: AtomicUsize,
}

fn read<T>(lock: &RwLock<T>) -> StorageResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| StorageError::Unavailable {
        reason: "mock store lock poisoned".to_string(),
    })
}

fn write<T>(lock: &RwLock<T>) -> StorageResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| StorageError::Unavailable {
        reason: "mock store lock poisoned".to_string(),
    })
}

impl MockStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `table` fail with `QueryFailed`.
    pub fn fail_table(&self, table: &'static str) {
        if let Ok(mut failing) = self.inner.failing.write() {
            failing.insert(table);
        }
    }

    /// Number of successful mutating calls.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn check(&self, table: &'static str) -> StorageResult<()> {
        if read(&self.inner.failing)?.contains(table) {
            return Err(StorageError::QueryFailed {
                table,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn record_write(&self) {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
    }

    // ========================================================================
    // SEEDING
    // ========================================================================

    pub fn insert_lead(&self, lead: Lead) {
        if let Ok(mut leads) = self.inner.leads.write() {
            leads.insert(lead.id, lead);
        }
    }

    pub fn insert_site(&self, site: Site) {
        if let Ok(mut sites) = self.inner.sites.write() {
            sites.insert(site.id, site);
        }
    }

    pub fn insert_settings(&self, settings: SiteSettings) {
        if let Ok(mut all) = self.inner.settings.write() {
            all.insert(settings.site_id, settings);
        }
    }

    pub fn insert_profile(&self, profile: Profile) {
        if let Ok(mut profiles) = self.inner.profiles.write() {
            profiles.insert(profile.id, profile);
        }
    }

    pub fn add_team_member(&self, site_id: EntityId, member: TeamMember) {
        if let Ok(mut team) = self.inner.team.write() {
            team.entry(site_id).or_default().push(member);
        }
    }

    pub fn set_team_stats(&self, site_id: EntityId, stats: Vec<TeamMemberStats>) {
        if let Ok(mut all) = self.inner.stats.write() {
            all.insert(site_id, stats);
        }
    }

    pub fn insert_agent(&self, agent: Agent) {
        if let Ok(mut agents) = self.inner.agents.write() {
            agents.insert(agent.id, agent);
        }
    }

    pub fn insert_segment(&self, segment: Segment) {
        if let Ok(mut segments) = self.inner.segments.write() {
            segments.insert(segment.id, segment);
        }
    }

    pub fn insert_campaign(&self, campaign: Campaign) {
        if let Ok(mut campaigns) = self.inner.campaigns.write() {
            campaigns.insert(campaign.id, campaign);
        }
    }

    pub fn insert_content(&self, content: Content) {
        if let Ok(mut contents) = self.inner.contents.write() {
            contents.insert(content.id, content);
        }
    }

    pub fn insert_instance(&self, instance: RemoteInstance) {
        if let Ok(mut instances) = self.inner.instances.write() {
            instances.insert(instance.id, instance);
        }
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    pub fn lead(&self, id: EntityId) -> Option<Lead> {
        self.inner.leads.read().ok()?.get(&id).cloned()
    }

    pub fn leads_for_site(&self, site_id: EntityId) -> Vec<Lead> {
        self.inner
            .leads
            .read()
            .map(|leads| {
                leads
                    .values()
                    .filter(|l| l.site_id == site_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner
            .messages
            .read()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.inner
            .tasks
            .read()
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.inner
            .conversations
            .read()
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<NewNotification> {
        self.inner
            .notifications
            .read()
            .map(|n| n.iter().map(|(_, n)| n.clone()).collect())
            .unwrap_or_default()
    }
}

fn filter_by_ids<T>(rows: Vec<T>, ids: Option<&[EntityId]>, id_of: impl Fn(&T) -> EntityId) -> Vec<T> {
    match ids {
        Some(ids) => rows.into_iter().filter(|r| ids.contains(&id_of(r))).collect(),
        None => rows,
    }
}

#[async_trait]
impl SalesStore for MockStore {
    // === Leads ===

    async fn lead_get(&self, id: EntityId) -> StorageResult<Option<Lead>> {
        self.check("leads")?;
        Ok(read(&self.inner.leads)?.get(&id).cloned())
    }

    async fn lead_update_assignee(
        &self,
        id: EntityId,
        assignee_id: EntityId,
    ) -> StorageResult<Lead> {
        self.check("leads")?;
        let mut leads = write(&self.inner.leads)?;
        let lead = leads
            .get_mut(&id)
            .ok_or(StorageError::NotFound { entity: "Lead", id })?;
        lead.assignee_id = Some(assignee_id);
        lead.updated_at = Utc::now();
        let updated = lead.clone();
        drop(leads);
        self.record_write();
        Ok(updated)
    }

    async fn lead_insert(&self, lead: &NewLead) -> StorageResult<Lead> {
        self.check("leads")?;
        let now = Utc::now();
        let row = Lead {
            id: new_entity_id(),
            site_id: lead.site_id,
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            company: lead.company.clone(),
            position: lead.position.clone(),
            status: lead.status.clone(),
            assignee_id: None,
            segment_id: lead.segment_id,
            origin: Some(lead.origin.clone()),
            notes: lead.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        write(&self.inner.leads)?.insert(row.id, row.clone());
        self.record_write();
        Ok(row)
    }

    async fn leads_for_selection(
        &self,
        site_id: EntityId,
        filter: &LeadFilter,
    ) -> StorageResult<Vec<Lead>> {
        self.check("leads")?;
        let leads = read(&self.inner.leads)?;
        let mut rows: Vec<Lead> = leads
            .values()
            .filter(|l| l.site_id == site_id)
            .filter(|l| filter.status.as_ref().map_or(true, |s| &l.status == s))
            .filter(|l| filter.segment_id.map_or(true, |s| l.segment_id == Some(s)))
            .filter(|l| !filter.unassigned_only || l.assignee_id.is_none())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(filter.limit.max(0) as usize);
        Ok(rows)
    }

    async fn lead_count_for_site(&self, site_id: EntityId) -> StorageResult<i64> {
        self.check("leads")?;
        let leads = read(&self.inner.leads)?;
        Ok(leads.values().filter(|l| l.site_id == site_id).count() as i64)
    }

    // === Sites and team ===

    async fn site_get(&self, id: EntityId) -> StorageResult<Option<Site>> {
        self.check("sites")?;
        Ok(read(&self.inner.sites)?.get(&id).cloned())
    }

    async fn site_settings_get(&self, site_id: EntityId) -> StorageResult<Option<SiteSettings>> {
        self.check("settings")?;
        Ok(read(&self.inner.settings)?.get(&site_id).cloned())
    }

    async fn profile_get(&self, user_id: EntityId) -> StorageResult<Option<Profile>> {
        self.check("profiles")?;
        Ok(read(&self.inner.profiles)?.get(&user_id).cloned())
    }

    async fn team_members(&self, site_id: EntityId) -> StorageResult<Vec<TeamMember>> {
        self.check("site_members")?;
        Ok(read(&self.inner.team)?
            .get(&site_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn team_member_stats(&self, site_id: EntityId) -> StorageResult<Vec<TeamMemberStats>> {
        self.check("sales")?;
        Ok(read(&self.inner.stats)?
            .get(&site_id)
            .cloned()
            .unwrap_or_default())
    }

    // === Agents and segments ===

    async fn agent_get(&self, id: EntityId) -> StorageResult<Option<Agent>> {
        self.check("agents")?;
        Ok(read(&self.inner.agents)?.get(&id).cloned())
    }

    async fn active_agent_for_role(
        &self,
        site_id: EntityId,
        role: &str,
    ) -> StorageResult<Option<Agent>> {
        self.check("agents")?;
        let agents = read(&self.inner.agents)?;
        Ok(agents
            .values()
            .filter(|a| a.site_id == site_id && a.role == role && a.is_active())
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn segment_get(&self, id: EntityId) -> StorageResult<Option<Segment>> {
        self.check("segments")?;
        Ok(read(&self.inner.segments)?.get(&id).cloned())
    }

    async fn segments_for_site(&self, site_id: EntityId) -> StorageResult<Vec<Segment>> {
        self.check("segments")?;
        let segments = read(&self.inner.segments)?;
        let mut rows: Vec<Segment> = segments
            .values()
            .filter(|s| s.site_id == site_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    // === Conversations, messages, tasks ===

    async fn conversation_find_or_create(
        &self,
        site_id: EntityId,
        lead_id: EntityId,
        channel: Channel,
        agent_id: Option<EntityId>,
    ) -> StorageResult<Conversation> {
        self.check("conversations")?;
        let mut conversations = write(&self.inner.conversations)?;
        if let Some(existing) = conversations
            .values()
            .find(|c| c.lead_id == lead_id && c.channel == channel && c.status == "active")
        {
            return Ok(existing.clone());
        }

        let conversation = Conversation {
            id: new_entity_id(),
            site_id,
            lead_id,
            agent_id,
            channel,
            title: Some(format!("{} follow-up", channel)),
            status: "active".to_string(),
            created_at: Utc::now(),
        };
        conversations.insert(conversation.id, conversation.clone());
        drop(conversations);
        self.record_write();
        Ok(conversation)
    }

    async fn conversations_for_lead(
        &self,
        lead_id: EntityId,
        limit: i64,
    ) -> StorageResult<Vec<Conversation>> {
        self.check("conversations")?;
        let conversations = read(&self.inner.conversations)?;
        let mut rows: Vec<Conversation> = conversations
            .values()
            .filter(|c| c.lead_id == lead_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn messages_for_conversation(
        &self,
        conversation_id: EntityId,
        limit: i64,
    ) -> StorageResult<Vec<Message>> {
        self.check("messages")?;
        let messages = read(&self.inner.messages)?;
        let mut rows: Vec<Message> = messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let skip = rows.len().saturating_sub(limit.max(0) as usize);
        Ok(rows.into_iter().skip(skip).collect())
    }

    async fn message_insert(&self, message: &NewMessage) -> StorageResult<Message> {
        self.check("messages")?;
        let row = Message {
            id: new_entity_id(),
            conversation_id: message.conversation_id,
            lead_id: message.lead_id,
            role: message.role,
            content: message.content.clone(),
            custom_data: message.custom_data.clone(),
            created_at: Utc::now(),
        };
        write(&self.inner.messages)?.insert(row.id, row.clone());
        self.record_write();
        Ok(row)
    }

    async fn task_insert(&self, task: &NewTask) -> StorageResult<Task> {
        self.check("tasks")?;
        let row = Task {
            id: new_entity_id(),
            site_id: task.site_id,
            lead_id: task.lead_id,
            user_id: task.user_id,
            title: task.title.clone(),
            description: task.description.clone(),
            task_type: task.task_type.clone(),
            status: task.status.clone(),
            priority: task.priority,
            scheduled_date: task.scheduled_date,
            created_at: Utc::now(),
        };
        write(&self.inner.tasks)?.insert(row.id, row.clone());
        self.record_write();
        Ok(row)
    }

    // === Campaigns, content, notifications ===

    async fn campaigns_by_status(
        &self,
        site_id: EntityId,
        status: &str,
        ids: Option<&[EntityId]>,
    ) -> StorageResult<Vec<Campaign>> {
        self.check("campaigns")?;
        let campaigns = read(&self.inner.campaigns)?;
        let mut rows: Vec<Campaign> = campaigns
            .values()
            .filter(|c| c.site_id == site_id && c.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(filter_by_ids(rows, ids, |c| c.id))
    }

    async fn contents_by_status(
        &self,
        site_id: EntityId,
        status: &str,
        ids: Option<&[EntityId]>,
    ) -> StorageResult<Vec<Content>> {
        self.check("content")?;
        let contents = read(&self.inner.contents)?;
        let mut rows: Vec<Content> = contents
            .values()
            .filter(|c| c.site_id == site_id && c.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(filter_by_ids(rows, ids, |c| c.id))
    }

    async fn notification_insert(
        &self,
        notification: &NewNotification,
    ) -> StorageResult<EntityId> {
        self.check("notifications")?;
        let id = new_entity_id();
        write(&self.inner.notifications)?.push((id, notification.clone()));
        self.record_write();
        Ok(id)
    }

    // === Robots ===

    async fn remote_instance_get(&self, id: EntityId) -> StorageResult<Option<RemoteInstance>> {
        self.check("remote_instances")?;
        Ok(read(&self.inner.instances)?.get(&id).cloned())
    }

    async fn ping(&self) -> StorageResult<()> {
        self.check("ping")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uncodie_core::{MessageRole, Priority};

    fn site(id: EntityId) -> Site {
        Site {
            id,
            name: "Acme".to_string(),
            url: None,
            user_id: new_entity_id(),
            description: None,
        }
    }

    fn agent(site_id: EntityId, role: &str, status: &str, age_secs: i64) -> Agent {
        Agent {
            id: new_entity_id(),
            site_id,
            user_id: new_entity_id(),
            name: format!("{} agent", role),
            role: role.to_string(),
            status: status.to_string(),
            created_at: Utc::now() - chrono::Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn test_active_agent_prefers_newest() {
        let store = MockStore::new();
        let site_id = new_entity_id();
        store.insert_site(site(site_id));
        let old = agent(site_id, "sales", "active", 100);
        let new = agent(site_id, "sales", "active", 1);
        let inactive = agent(site_id, "sales", "inactive", 0);
        store.insert_agent(old);
        store.insert_agent(new.clone());
        store.insert_agent(inactive);

        let found = store.active_agent_for_role(site_id, "sales").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(new.id));

        let none = store.active_agent_for_role(site_id, "copywriter").await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_conversation_find_or_create_is_idempotent() {
        let store = MockStore::new();
        let site_id = new_entity_id();
        let lead_id = new_entity_id();

        let first = store
            .conversation_find_or_create(site_id, lead_id, Channel::Email, None)
            .await
            .unwrap();
        let second = store
            .conversation_find_or_create(site_id, lead_id, Channel::Email, None)
            .await
            .unwrap();
        let other = store
            .conversation_find_or_create(site_id, lead_id, Channel::Whatsapp, None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, other.id);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_conversation_history_keeps_latest_messages() {
        let store = MockStore::new();
        let lead_id = new_entity_id();
        let conversation = store
            .conversation_find_or_create(new_entity_id(), lead_id, Channel::Email, None)
            .await
            .unwrap();

        for i in 0..5 {
            store
                .message_insert(&NewMessage {
                    conversation_id: conversation.id,
                    lead_id: Some(lead_id),
                    agent_id: None,
                    role: MessageRole::User,
                    content: format!("message {}", i),
                    custom_data: serde_json::json!({}),
                })
                .await
                .unwrap();
        }

        let history = store.conversation_history(lead_id, 5, 2).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MockStore::new();
        store.fail_table("leads");
        let err = store.lead_get(new_entity_id()).await.unwrap_err();
        assert!(matches!(err, StorageError::QueryFailed { table: "leads", .. }));
    }

    #[tokio::test]
    async fn test_task_insert_records_write() {
        let store = MockStore::new();
        let task = store
            .task_insert(&NewTask {
                site_id: new_entity_id(),
                lead_id: new_entity_id(),
                user_id: None,
                title: "Follow up".to_string(),
                description: None,
                task_type: "follow_up".to_string(),
                status: "pending".to_string(),
                priority: Priority::High,
                scheduled_date: None,
            })
            .await
            .unwrap();
        assert_eq!(task.priority, Priority::High);
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.write_count(), 1);
    }
}
