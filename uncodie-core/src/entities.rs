//! Rows of the relational store and the agent framework's command snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::enums::{Channel, CommandStatus, MessageRole, Priority};
use crate::identity::{EntityId, Timestamp};

// ============================================================================
// LEADS
// ============================================================================

/// A sales prospect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Lead {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub site_id: EntityId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    /// Free text: new, contacted, qualified, converted, lost, ...
    pub status: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub assignee_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub segment_id: Option<EntityId>,
    pub origin: Option<String>,
    pub notes: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl Lead {
    /// Lead email, if present and non-blank.
    pub fn contact_email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    /// Lead phone, if present and non-blank.
    pub fn contact_phone(&self) -> Option<&str> {
        self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Insert payload for leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub site_id: EntityId,
    pub user_id: Option<EntityId>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub status: String,
    pub segment_id: Option<EntityId>,
    pub origin: String,
    pub notes: Option<String>,
}

/// Filter for lead selection candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadFilter {
    pub status: Option<String>,
    pub segment_id: Option<EntityId>,
    pub unassigned_only: bool,
    pub limit: i64,
}

// ============================================================================
// SITES, SETTINGS AND TEAM
// ============================================================================

/// A tenant account scoping leads, agents and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Site {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    pub name: String,
    pub url: Option<String>,
    /// Owner of the site.
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub user_id: EntityId,
    pub description: Option<String>,
}

/// Per-channel switch from `settings.channels`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChannelSetting {
    pub enabled: bool,
}

/// Channels configured for a site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SiteChannels {
    pub email: ChannelSetting,
    pub whatsapp: ChannelSetting,
    pub notification: ChannelSetting,
    pub web: ChannelSetting,
}

impl SiteChannels {
    /// Parse the `settings.channels` JSON object.
    ///
    /// A channel counts as configured when its key is present and its
    /// `enabled` flag is not explicitly `false`. `website` is accepted as an
    /// alias for `web`.
    pub fn from_settings_json(value: &JsonValue) -> Self {
        let flag = |keys: &[&str]| -> ChannelSetting {
            let entry = keys.iter().find_map(|k| value.get(*k));
            let enabled = match entry {
                None | Some(JsonValue::Null) => false,
                Some(JsonValue::Bool(b)) => *b,
                Some(obj) => obj
                    .get("enabled")
                    .and_then(JsonValue::as_bool)
                    .unwrap_or(true),
            };
            ChannelSetting { enabled }
        };

        Self {
            email: flag(&["email"]),
            whatsapp: flag(&["whatsapp"]),
            notification: flag(&["notification", "notifications"]),
            web: flag(&["web", "website"]),
        }
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email.enabled,
            Channel::Whatsapp => self.whatsapp.enabled,
            Channel::Notification => self.notification.enabled,
            Channel::Web => self.web.enabled,
        }
    }

    pub fn enabled(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }
}

/// Site settings relevant to the sales workflows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub site_id: EntityId,
    pub channels: SiteChannels,
    pub company_size: Option<String>,
    pub industry: Option<String>,
    /// Ideal customer profile, free text.
    pub icp: Option<String>,
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Profile {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("Team member")
    }
}

/// A member of a site's team (owner or invited member).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: EntityId,
    pub name: Option<String>,
    pub email: Option<String>,
    /// `owner`, `admin`, `marketing`, ...
    pub role: String,
}

/// Per-member performance used for team attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMemberStats {
    pub user_id: EntityId,
    pub name: String,
    pub conversions: i64,
    pub sales_total: f64,
    pub active_leads: i64,
}

// ============================================================================
// AGENTS AND SEGMENTS
// ============================================================================

/// An AI agent configured for a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Agent {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub site_id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub user_id: EntityId,
    pub name: String,
    pub role: String,
    pub status: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Agent {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// An audience segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: EntityId,
    pub site_id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub audience: Option<String>,
}

// ============================================================================
// CONVERSATIONS, MESSAGES, TASKS
// ============================================================================

/// A per-lead conversation on one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: EntityId,
    pub site_id: EntityId,
    pub lead_id: EntityId,
    pub agent_id: Option<EntityId>,
    pub channel: Channel,
    pub title: Option<String>,
    pub status: String,
    pub created_at: Timestamp,
}

/// A message within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: EntityId,
    pub conversation_id: EntityId,
    pub lead_id: Option<EntityId>,
    pub role: MessageRole,
    pub content: String,
    pub custom_data: JsonValue,
    pub created_at: Timestamp,
}

/// Insert payload for messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: EntityId,
    pub lead_id: Option<EntityId>,
    pub agent_id: Option<EntityId>,
    pub role: MessageRole,
    pub content: String,
    pub custom_data: JsonValue,
}

/// A conversation together with its most recent messages.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationHistory {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Insert payload for tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub site_id: EntityId,
    pub lead_id: EntityId,
    pub user_id: Option<EntityId>,
    pub title: String,
    pub description: Option<String>,
    pub task_type: String,
    pub status: String,
    pub priority: Priority,
    pub scheduled_date: Option<Timestamp>,
}

/// A follow-up task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    pub site_id: EntityId,
    pub lead_id: EntityId,
    pub user_id: Option<EntityId>,
    pub title: String,
    pub description: Option<String>,
    pub task_type: String,
    pub status: String,
    pub priority: Priority,
    pub scheduled_date: Option<Timestamp>,
    pub created_at: Timestamp,
}

// ============================================================================
// MARKETING ARTIFACTS AND NOTIFICATIONS
// ============================================================================

/// A campaign awaiting or past review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Campaign {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub site_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

/// A content draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Content {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub site_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub status: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

/// Insert payload for in-app notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub site_id: EntityId,
    pub user_id: EntityId,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<EntityId>,
}

/// A remote robot instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteInstance {
    pub id: EntityId,
    pub site_id: EntityId,
    pub name: String,
    pub status: String,
    pub provider: Option<String>,
}

impl RemoteInstance {
    /// Instances that are stopped or errored cannot take instructions.
    pub fn is_usable(&self) -> bool {
        !matches!(self.status.as_str(), "stopped" | "error" | "failed")
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Metadata the agent framework attaches to a command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// Row id in the `commands` table, when the framework persisted one.
    #[serde(default, rename = "dbUuid", alias = "db_uuid", skip_serializing_if = "Option::is_none")]
    pub db_uuid: Option<EntityId>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

/// Snapshot of a command as reported by the agent framework.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    #[serde(default)]
    pub status: CommandStatus,
    #[serde(default)]
    pub results: Vec<JsonValue>,
    #[serde(default)]
    pub metadata: CommandMetadata,
}

impl Command {
    /// Id to report to callers: the persisted row id when known, otherwise
    /// the framework id.
    pub fn effective_id(&self) -> String {
        self.metadata
            .db_uuid
            .map(|id| id.to_string())
            .unwrap_or_else(|| self.id.clone())
    }

    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_site_channels_from_settings() {
        let channels = SiteChannels::from_settings_json(&json!({
            "email": { "enabled": true, "email": "hello@acme.test" },
            "whatsapp": { "enabled": false },
            "website": { "widget": true }
        }));

        assert!(channels.is_enabled(Channel::Email));
        assert!(!channels.is_enabled(Channel::Whatsapp));
        assert!(channels.is_enabled(Channel::Web));
        assert!(!channels.is_enabled(Channel::Notification));
        assert_eq!(channels.enabled(), vec![Channel::Email, Channel::Web]);
    }

    #[test]
    fn test_site_channels_from_non_object() {
        let channels = SiteChannels::from_settings_json(&json!(null));
        assert!(channels.enabled().is_empty());
    }

    #[test]
    fn test_command_effective_id_prefers_db_uuid() {
        let db_uuid = uuid::Uuid::now_v7();
        let cmd: Command = serde_json::from_value(json!({
            "id": "cmd_123",
            "status": "completed",
            "results": [],
            "metadata": { "dbUuid": db_uuid.to_string(), "agent": "x" }
        }))
        .unwrap();

        assert_eq!(cmd.effective_id(), db_uuid.to_string());
        assert_eq!(cmd.metadata.extra.get("agent"), Some(&json!("x")));

        let bare: Command = serde_json::from_value(json!({ "id": "cmd_9" })).unwrap();
        assert_eq!(bare.effective_id(), "cmd_9");
        assert_eq!(bare.status, CommandStatus::Pending);
        assert!(!bare.has_results());
    }

    #[test]
    fn test_lead_contact_ignores_blank() {
        let now = chrono::Utc::now();
        let lead = Lead {
            id: uuid::Uuid::now_v7(),
            site_id: uuid::Uuid::now_v7(),
            name: "Ana".to_string(),
            email: Some("  ".to_string()),
            phone: Some("+34 600 000 000".to_string()),
            company: None,
            position: None,
            status: "new".to_string(),
            assignee_id: None,
            segment_id: None,
            origin: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(lead.contact_email(), None);
        assert_eq!(lead.contact_phone(), Some("+34 600 000 000"));
    }
}
