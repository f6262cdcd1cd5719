//! Database Connection Pool Module
//!
//! PostgreSQL (Supabase) access through deadpool-postgres. [`DbClient`]
//! implements [`SalesStore`] with plain parameterized SQL against the
//! application tables; rows are decoded by hand into `uncodie-core` types.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio_postgres::{types::FromSql, NoTls, Row};
use uncodie_core::{
    Agent, Campaign, Channel, ConfigError, Content, Conversation, EntityId, Lead, LeadFilter,
    Message, MessageRole, NewLead, NewMessage, NewNotification, NewTask, Priority, Profile,
    RemoteInstance, Segment, Site, SiteChannels, SiteSettings, StorageError, StorageResult, Task,
    TeamMember, TeamMemberStats,
};
use uncodie_storage::SalesStore;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
    /// Wait limit when checking a connection out of the pool
    pub timeout: Duration,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from `UNCODIE_DB_*` variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("UNCODIE_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("UNCODIE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("UNCODIE_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("UNCODIE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("UNCODIE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("UNCODIE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: Duration::from_secs(
                std::env::var("UNCODIE_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> Result<Pool, ConfigError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: self.max_size,
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(self.timeout),
                ..Default::default()
            },
            ..Default::default()
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ConfigError::InvalidValue {
                field: "UNCODIE_DB_HOST".to_string(),
                value: self.host.clone(),
                reason: format!("Failed to create pool: {}", e),
            })
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Postgres-backed [`SalesStore`].
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl std::fmt::Debug for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbClient")
            .field("pool_size", &self.pool_size())
            .finish()
    }
}

const LEAD_COLUMNS: &str = "id, site_id, name, email, phone, to_jsonb(company) AS company, \
     position, status, assignee_id, segment_id, origin, notes, created_at, updated_at";

const CONVERSATION_COLUMNS: &str =
    "id, site_id, lead_id, agent_id, channel, title, status, created_at";

const MESSAGE_COLUMNS: &str = "id, conversation_id, lead_id, role, content, custom_data, created_at";

const TASK_COLUMNS: &str = "id, site_id, lead_id, user_id, title, description, type, status, \
     priority, scheduled_date, created_at";

impl DbClient {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> Result<Self, ConfigError> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> StorageResult<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Unavailable {
                reason: e.to_string(),
            })
    }
}

// ============================================================================
// ROW DECODING
// ============================================================================

fn col<'a, T: FromSql<'a>>(row: &'a Row, table: &'static str, column: &str) -> StorageResult<T> {
    row.try_get(column).map_err(|e| StorageError::Decode {
        table,
        reason: format!("{}: {}", column, e),
    })
}

fn query_failed(table: &'static str) -> impl Fn(tokio_postgres::Error) -> StorageError {
    move |e| StorageError::QueryFailed {
        table,
        reason: e.to_string(),
    }
}

fn insert_failed(table: &'static str) -> impl Fn(tokio_postgres::Error) -> StorageError {
    move |e| StorageError::InsertFailed {
        table,
        reason: e.to_string(),
    }
}

/// `leads.company` is either plain text or an object with a `name`.
fn company_name(value: Option<JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s),
        JsonValue::Object(map) => map
            .get("name")
            .and_then(|n| n.as_str())
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string),
        _ => None,
    }
}

fn lead_from_row(row: &Row) -> StorageResult<Lead> {
    Ok(Lead {
        id: col(row, "leads", "id")?,
        site_id: col(row, "leads", "site_id")?,
        name: col::<Option<String>>(row, "leads", "name")?.unwrap_or_default(),
        email: col(row, "leads", "email")?,
        phone: col(row, "leads", "phone")?,
        company: company_name(col(row, "leads", "company")?),
        position: col(row, "leads", "position")?,
        status: col::<Option<String>>(row, "leads", "status")?
            .unwrap_or_else(|| uncodie_core::lead_status::NEW.to_string()),
        assignee_id: col(row, "leads", "assignee_id")?,
        segment_id: col(row, "leads", "segment_id")?,
        origin: col(row, "leads", "origin")?,
        notes: col(row, "leads", "notes")?,
        created_at: col(row, "leads", "created_at")?,
        updated_at: col(row, "leads", "updated_at")?,
    })
}

fn agent_from_row(row: &Row) -> StorageResult<Agent> {
    Ok(Agent {
        id: col(row, "agents", "id")?,
        site_id: col(row, "agents", "site_id")?,
        user_id: col(row, "agents", "user_id")?,
        name: col(row, "agents", "name")?,
        role: col(row, "agents", "role")?,
        status: col(row, "agents", "status")?,
        created_at: col(row, "agents", "created_at")?,
    })
}

fn segment_from_row(row: &Row) -> StorageResult<Segment> {
    Ok(Segment {
        id: col(row, "segments", "id")?,
        site_id: col(row, "segments", "site_id")?,
        name: col(row, "segments", "name")?,
        description: col(row, "segments", "description")?,
        audience: col(row, "segments", "audience")?,
    })
}

fn conversation_from_row(row: &Row) -> StorageResult<Conversation> {
    let channel: String = col(row, "conversations", "channel")?;
    Ok(Conversation {
        id: col(row, "conversations", "id")?,
        site_id: col(row, "conversations", "site_id")?,
        lead_id: col(row, "conversations", "lead_id")?,
        agent_id: col(row, "conversations", "agent_id")?,
        channel: channel.parse::<Channel>().map_err(|e| StorageError::Decode {
            table: "conversations",
            reason: e.to_string(),
        })?,
        title: col(row, "conversations", "title")?,
        status: col(row, "conversations", "status")?,
        created_at: col(row, "conversations", "created_at")?,
    })
}

fn message_from_row(row: &Row) -> StorageResult<Message> {
    let role: String = col(row, "messages", "role")?;
    Ok(Message {
        id: col(row, "messages", "id")?,
        conversation_id: col(row, "messages", "conversation_id")?,
        lead_id: col(row, "messages", "lead_id")?,
        role: role.parse::<MessageRole>().map_err(|e| StorageError::Decode {
            table: "messages",
            reason: e.to_string(),
        })?,
        content: col::<Option<String>>(row, "messages", "content")?.unwrap_or_default(),
        custom_data: col::<Option<JsonValue>>(row, "messages", "custom_data")?
            .unwrap_or_else(|| JsonValue::Object(Default::default())),
        created_at: col(row, "messages", "created_at")?,
    })
}

fn task_from_row(row: &Row) -> StorageResult<Task> {
    let priority: Option<String> = col(row, "tasks", "priority")?;
    Ok(Task {
        id: col(row, "tasks", "id")?,
        site_id: col(row, "tasks", "site_id")?,
        lead_id: col(row, "tasks", "lead_id")?,
        user_id: col(row, "tasks", "user_id")?,
        title: col(row, "tasks", "title")?,
        description: col(row, "tasks", "description")?,
        task_type: col(row, "tasks", "type")?,
        status: col(row, "tasks", "status")?,
        priority: priority
            .and_then(|p| p.parse::<Priority>().ok())
            .unwrap_or_default(),
        scheduled_date: col(row, "tasks", "scheduled_date")?,
        created_at: col(row, "tasks", "created_at")?,
    })
}

// ============================================================================
// SALES STORE
// ============================================================================

#[async_trait]
impl SalesStore for DbClient {
    // === Leads ===

    async fn lead_get(&self, id: EntityId) -> StorageResult<Option<Lead>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM leads WHERE id = $1", LEAD_COLUMNS);
        let row = conn
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(query_failed("leads"))?;
        row.as_ref().map(lead_from_row).transpose()
    }

    async fn lead_update_assignee(
        &self,
        id: EntityId,
        assignee_id: EntityId,
    ) -> StorageResult<Lead> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "UPDATE leads SET assignee_id = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            LEAD_COLUMNS
        );
        let row = conn
            .query_opt(sql.as_str(), &[&id, &assignee_id])
            .await
            .map_err(|e| StorageError::UpdateFailed {
                table: "leads",
                id,
                reason: e.to_string(),
            })?
            .ok_or(StorageError::NotFound { entity: "Lead", id })?;
        lead_from_row(&row)
    }

    async fn lead_insert(&self, lead: &NewLead) -> StorageResult<Lead> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "INSERT INTO leads (site_id, user_id, name, email, phone, company, position, status, \
             segment_id, origin, notes) \
             VALUES ($1, $2, $3, $4, $5, \
             CASE WHEN $6::text IS NULL THEN NULL ELSE jsonb_build_object('name', $6::text) END, \
             $7, $8, $9, $10, $11) \
             RETURNING {}",
            LEAD_COLUMNS
        );
        let row = conn
            .query_one(
                sql.as_str(),
                &[
                    &lead.site_id,
                    &lead.user_id,
                    &lead.name,
                    &lead.email,
                    &lead.phone,
                    &lead.company,
                    &lead.position,
                    &lead.status,
                    &lead.segment_id,
                    &lead.origin,
                    &lead.notes,
                ],
            )
            .await
            .map_err(insert_failed("leads"))?;
        lead_from_row(&row)
    }

    async fn leads_for_selection(
        &self,
        site_id: EntityId,
        filter: &LeadFilter,
    ) -> StorageResult<Vec<Lead>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM leads \
             WHERE site_id = $1 \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::uuid IS NULL OR segment_id = $3) \
               AND (NOT $4 OR assignee_id IS NULL) \
             ORDER BY created_at DESC LIMIT $5",
            LEAD_COLUMNS
        );
        let rows = conn
            .query(
                sql.as_str(),
                &[
                    &site_id,
                    &filter.status,
                    &filter.segment_id,
                    &filter.unassigned_only,
                    &filter.limit,
                ],
            )
            .await
            .map_err(query_failed("leads"))?;
        rows.iter().map(lead_from_row).collect()
    }

    async fn lead_count_for_site(&self, site_id: EntityId) -> StorageResult<i64> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one("SELECT COUNT(*) AS total FROM leads WHERE site_id = $1", &[&site_id])
            .await
            .map_err(query_failed("leads"))?;
        col(&row, "leads", "total")
    }

    // === Sites and team ===

    async fn site_get(&self, id: EntityId) -> StorageResult<Option<Site>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, name, url, user_id, description FROM sites WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(query_failed("sites"))?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Site {
            id: col(&row, "sites", "id")?,
            name: col(&row, "sites", "name")?,
            url: col(&row, "sites", "url")?,
            user_id: col(&row, "sites", "user_id")?,
            description: col(&row, "sites", "description")?,
        }))
    }

    async fn site_settings_get(&self, site_id: EntityId) -> StorageResult<Option<SiteSettings>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT site_id, channels, company_size, industry, icp \
                 FROM settings WHERE site_id = $1",
                &[&site_id],
            )
            .await
            .map_err(query_failed("settings"))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let channels: Option<JsonValue> = col(&row, "settings", "channels")?;
        Ok(Some(SiteSettings {
            site_id: col(&row, "settings", "site_id")?,
            channels: SiteChannels::from_settings_json(&channels.unwrap_or(JsonValue::Null)),
            company_size: col(&row, "settings", "company_size")?,
            industry: col(&row, "settings", "industry")?,
            icp: col(&row, "settings", "icp")?,
        }))
    }

    async fn profile_get(&self, user_id: EntityId) -> StorageResult<Option<Profile>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt("SELECT id, name, email FROM profiles WHERE id = $1", &[&user_id])
            .await
            .map_err(query_failed("profiles"))?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Profile {
            id: col(&row, "profiles", "id")?,
            name: col(&row, "profiles", "name")?,
            email: col(&row, "profiles", "email")?,
        }))
    }

    async fn team_members(&self, site_id: EntityId) -> StorageResult<Vec<TeamMember>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT s.user_id, p.name, p.email, 'owner' AS role \
                 FROM sites s LEFT JOIN profiles p ON p.id = s.user_id \
                 WHERE s.id = $1 \
                 UNION ALL \
                 SELECT m.user_id, p.name, COALESCE(p.email, m.email) AS email, \
                        COALESCE(m.role, 'member') AS role \
                 FROM site_members m LEFT JOIN profiles p ON p.id = m.user_id \
                 WHERE m.site_id = $1 AND m.status = 'active' AND m.user_id IS NOT NULL \
                   AND m.user_id <> (SELECT user_id FROM sites WHERE id = $1)",
                &[&site_id],
            )
            .await
            .map_err(query_failed("site_members"))?;
        rows.iter()
            .map(|row| {
                Ok(TeamMember {
                    user_id: col(row, "site_members", "user_id")?,
                    name: col(row, "site_members", "name")?,
                    email: col(row, "site_members", "email")?,
                    role: col(row, "site_members", "role")?,
                })
            })
            .collect()
    }

    async fn team_member_stats(&self, site_id: EntityId) -> StorageResult<Vec<TeamMemberStats>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "WITH team AS ( \
                     SELECT user_id FROM sites WHERE id = $1 \
                     UNION \
                     SELECT user_id FROM site_members \
                     WHERE site_id = $1 AND status = 'active' AND user_id IS NOT NULL \
                 ) \
                 SELECT t.user_id, \
                        COALESCE(p.name, p.email, 'Team member') AS name, \
                        (SELECT COUNT(*) FROM leads l WHERE l.site_id = $1 \
                            AND l.assignee_id = t.user_id AND l.status = 'converted') AS conversions, \
                        (SELECT COALESCE(SUM(s.amount), 0)::float8 FROM sales s \
                            WHERE s.site_id = $1 AND s.user_id = t.user_id) AS sales_total, \
                        (SELECT COUNT(*) FROM leads l WHERE l.site_id = $1 \
                            AND l.assignee_id = t.user_id \
                            AND l.status NOT IN ('converted', 'lost')) AS active_leads \
                 FROM team t LEFT JOIN profiles p ON p.id = t.user_id",
                &[&site_id],
            )
            .await
            .map_err(query_failed("sales"))?;
        rows.iter()
            .map(|row| {
                Ok(TeamMemberStats {
                    user_id: col(row, "sales", "user_id")?,
                    name: col(row, "sales", "name")?,
                    conversions: col(row, "sales", "conversions")?,
                    sales_total: col(row, "sales", "sales_total")?,
                    active_leads: col(row, "sales", "active_leads")?,
                })
            })
            .collect()
    }

    // === Agents and segments ===

    async fn agent_get(&self, id: EntityId) -> StorageResult<Option<Agent>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, site_id, user_id, name, role, status, created_at \
                 FROM agents WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(query_failed("agents"))?;
        row.as_ref().map(agent_from_row).transpose()
    }

    async fn active_agent_for_role(
        &self,
        site_id: EntityId,
        role: &str,
    ) -> StorageResult<Option<Agent>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, site_id, user_id, name, role, status, created_at \
                 FROM agents \
                 WHERE site_id = $1 AND role = $2 AND status = 'active' \
                 ORDER BY created_at DESC LIMIT 1",
                &[&site_id, &role],
            )
            .await
            .map_err(query_failed("agents"))?;
        row.as_ref().map(agent_from_row).transpose()
    }

    async fn segment_get(&self, id: EntityId) -> StorageResult<Option<Segment>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, site_id, name, description, audience::text AS audience \
                 FROM segments WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(query_failed("segments"))?;
        row.as_ref().map(segment_from_row).transpose()
    }

    async fn segments_for_site(&self, site_id: EntityId) -> StorageResult<Vec<Segment>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT id, site_id, name, description, audience::text AS audience \
                 FROM segments WHERE site_id = $1 ORDER BY created_at DESC",
                &[&site_id],
            )
            .await
            .map_err(query_failed("segments"))?;
        rows.iter().map(segment_from_row).collect()
    }

    // === Conversations, messages, tasks ===

    async fn conversation_find_or_create(
        &self,
        site_id: EntityId,
        lead_id: EntityId,
        channel: Channel,
        agent_id: Option<EntityId>,
    ) -> StorageResult<Conversation> {
        let conn = self.get_conn().await?;
        let find = format!(
            "SELECT {} FROM conversations \
             WHERE lead_id = $1 AND channel = $2 AND status = 'active' \
             ORDER BY created_at DESC LIMIT 1",
            CONVERSATION_COLUMNS
        );
        let existing = conn
            .query_opt(find.as_str(), &[&lead_id, &channel.as_str()])
            .await
            .map_err(query_failed("conversations"))?;
        if let Some(row) = existing {
            return conversation_from_row(&row);
        }

        let insert = format!(
            "INSERT INTO conversations (site_id, lead_id, agent_id, channel, title, status) \
             VALUES ($1, $2, $3, $4, $5, 'active') RETURNING {}",
            CONVERSATION_COLUMNS
        );
        let title = format!("{} follow-up", channel);
        let row = conn
            .query_one(
                insert.as_str(),
                &[&site_id, &lead_id, &agent_id, &channel.as_str(), &title],
            )
            .await
            .map_err(insert_failed("conversations"))?;
        tracing::debug!(%lead_id, %channel, "Created conversation");
        conversation_from_row(&row)
    }

    async fn conversations_for_lead(
        &self,
        lead_id: EntityId,
        limit: i64,
    ) -> StorageResult<Vec<Conversation>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM conversations WHERE lead_id = $1 ORDER BY created_at DESC LIMIT $2",
            CONVERSATION_COLUMNS
        );
        let rows = conn
            .query(sql.as_str(), &[&lead_id, &limit])
            .await
            .map_err(query_failed("conversations"))?;
        rows.iter().map(conversation_from_row).collect()
    }

    async fn messages_for_conversation(
        &self,
        conversation_id: EntityId,
        limit: i64,
    ) -> StorageResult<Vec<Message>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT * FROM ( \
                 SELECT {} FROM messages WHERE conversation_id = $1 \
                 ORDER BY created_at DESC LIMIT $2 \
             ) recent ORDER BY created_at ASC",
            MESSAGE_COLUMNS
        );
        let rows = conn
            .query(sql.as_str(), &[&conversation_id, &limit])
            .await
            .map_err(query_failed("messages"))?;
        rows.iter().map(message_from_row).collect()
    }

    async fn message_insert(&self, message: &NewMessage) -> StorageResult<Message> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "INSERT INTO messages (conversation_id, lead_id, agent_id, role, content, custom_data) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            MESSAGE_COLUMNS
        );
        let row = conn
            .query_one(
                sql.as_str(),
                &[
                    &message.conversation_id,
                    &message.lead_id,
                    &message.agent_id,
                    &message.role.as_str(),
                    &message.content,
                    &message.custom_data,
                ],
            )
            .await
            .map_err(insert_failed("messages"))?;
        message_from_row(&row)
    }

    async fn task_insert(&self, task: &NewTask) -> StorageResult<Task> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "INSERT INTO tasks (site_id, lead_id, user_id, title, description, type, status, \
             priority, scheduled_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            TASK_COLUMNS
        );
        let row = conn
            .query_one(
                sql.as_str(),
                &[
                    &task.site_id,
                    &task.lead_id,
                    &task.user_id,
                    &task.title,
                    &task.description,
                    &task.task_type,
                    &task.status,
                    &task.priority.as_str(),
                    &task.scheduled_date,
                ],
            )
            .await
            .map_err(insert_failed("tasks"))?;
        task_from_row(&row)
    }

    // === Campaigns, content, notifications ===

    async fn campaigns_by_status(
        &self,
        site_id: EntityId,
        status: &str,
        ids: Option<&[EntityId]>,
    ) -> StorageResult<Vec<Campaign>> {
        let conn = self.get_conn().await?;
        let ids: Option<Vec<EntityId>> = ids.map(<[EntityId]>::to_vec);
        let rows = conn
            .query(
                "SELECT id, site_id, title, description, status, created_at FROM campaigns \
                 WHERE site_id = $1 AND status = $2 AND ($3::uuid[] IS NULL OR id = ANY($3)) \
                 ORDER BY created_at DESC",
                &[&site_id, &status, &ids],
            )
            .await
            .map_err(query_failed("campaigns"))?;
        rows.iter()
            .map(|row| {
                Ok(Campaign {
                    id: col(row, "campaigns", "id")?,
                    site_id: col(row, "campaigns", "site_id")?,
                    title: col(row, "campaigns", "title")?,
                    description: col(row, "campaigns", "description")?,
                    status: col(row, "campaigns", "status")?,
                    created_at: col(row, "campaigns", "created_at")?,
                })
            })
            .collect()
    }

    async fn contents_by_status(
        &self,
        site_id: EntityId,
        status: &str,
        ids: Option<&[EntityId]>,
    ) -> StorageResult<Vec<Content>> {
        let conn = self.get_conn().await?;
        let ids: Option<Vec<EntityId>> = ids.map(<[EntityId]>::to_vec);
        let rows = conn
            .query(
                "SELECT id, site_id, title, description, type, status, created_at FROM content \
                 WHERE site_id = $1 AND status = $2 AND ($3::uuid[] IS NULL OR id = ANY($3)) \
                 ORDER BY created_at DESC",
                &[&site_id, &status, &ids],
            )
            .await
            .map_err(query_failed("content"))?;
        rows.iter()
            .map(|row| {
                Ok(Content {
                    id: col(row, "content", "id")?,
                    site_id: col(row, "content", "site_id")?,
                    title: col(row, "content", "title")?,
                    description: col(row, "content", "description")?,
                    content_type: col(row, "content", "type")?,
                    status: col(row, "content", "status")?,
                    created_at: col(row, "content", "created_at")?,
                })
            })
            .collect()
    }

    async fn notification_insert(
        &self,
        notification: &NewNotification,
    ) -> StorageResult<EntityId> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO notifications (site_id, user_id, title, message, type, \
                 related_entity_type, related_entity_id, is_read) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, false) RETURNING id",
                &[
                    &notification.site_id,
                    &notification.user_id,
                    &notification.title,
                    &notification.message,
                    &notification.notification_type,
                    &notification.related_entity_type,
                    &notification.related_entity_id,
                ],
            )
            .await
            .map_err(insert_failed("notifications"))?;
        col(&row, "notifications", "id")
    }

    // === Robots ===

    async fn remote_instance_get(&self, id: EntityId) -> StorageResult<Option<RemoteInstance>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, site_id, name, status, provider FROM remote_instances WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(query_failed("remote_instances"))?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(RemoteInstance {
            id: col(&row, "remote_instances", "id")?,
            site_id: col(&row, "remote_instances", "site_id")?,
            name: col(&row, "remote_instances", "name")?,
            status: col(&row, "remote_instances", "status")?,
            provider: col(&row, "remote_instances", "provider")?,
        }))
    }

    async fn ping(&self) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(query_failed("ping"))?;
        Ok(())
    }
}
