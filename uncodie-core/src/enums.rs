//! Enums shared across the workspace

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// ============================================================================
// CHANNEL
// ============================================================================

/// Communication medium configured per site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Channel {
    Email,
    Whatsapp,
    Notification,
    Web,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Email,
        Channel::Whatsapp,
        Channel::Notification,
        Channel::Web,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Whatsapp => "whatsapp",
            Channel::Notification => "notification",
            Channel::Web => "web",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "whatsapp" => Ok(Channel::Whatsapp),
            "notification" => Ok(Channel::Notification),
            "web" => Ok(Channel::Web),
            other => Err(ValidationError::InvalidValue {
                field: "channel".to_string(),
                reason: format!(
                    "'{}' is not one of: email, whatsapp, notification, web",
                    other
                ),
            }),
        }
    }
}

impl TryFrom<String> for Channel {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// COMMAND STATUS
// ============================================================================

/// Status of a command as reported by the agent framework.
///
/// Unknown strings deserialize as `Unknown` and are treated as still in
/// flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl CommandStatus {
    /// Whether the framework will not change this status again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandStatus::Completed | CommandStatus::Failed | CommandStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Running => "running",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
            CommandStatus::Cancelled => "cancelled",
            CommandStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PRIORITY
// ============================================================================

/// Priority used by assignments and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "normal" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(ValidationError::InvalidValue {
                field: "priority".to_string(),
                reason: format!("'{}' is not one of: low, medium, high, urgent", other),
            }),
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// MESSAGE ROLE
// ============================================================================

/// Author role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    TeamMember,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::TeamMember => "team_member",
        }
    }
}

impl FromStr for MessageRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" | "visitor" | "lead" => Ok(MessageRole::User),
            "assistant" | "agent" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            "team_member" => Ok(MessageRole::TeamMember),
            other => Err(ValidationError::InvalidValue {
                field: "role".to_string(),
                reason: format!("unknown message role '{}'", other),
            }),
        }
    }
}

// ============================================================================
// AGENT ROLES
// ============================================================================

/// Agent role names as stored in `agents.role`.
pub mod agent_roles {
    pub const SALES: &str = "Sales/CRM Specialist";
    pub const COPYWRITER: &str = "Content Creator & Copywriter";
    pub const ROBOT: &str = "Growth Robot";
}

/// Lead status values written by this service. The column itself is free text.
pub mod lead_status {
    pub const NEW: &str = "new";
    pub const CONTACTED: &str = "contacted";
    pub const QUALIFIED: &str = "qualified";
    pub const CONVERTED: &str = "converted";
    pub const LOST: &str = "lost";
}
