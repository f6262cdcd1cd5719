//! Typed result contracts.
//!
//! Each agent task declares the key its result lives under. A command's
//! `results` array is scanned for the first object carrying that key; the
//! object may carry a `version`, which must match [`CONTRACT_VERSION`].
//! Anything else is rejected as [`CommandError::InvalidResult`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uncodie_core::{parse_uuid, Channel, Command, CommandError, EntityId, Priority};

use crate::CommandResult;

/// Result contract version understood by this build.
pub const CONTRACT_VERSION: u64 = 1;

/// A result shape an agent can return.
pub trait ResultContract: DeserializeOwned {
    /// Key under which the result appears in a `results` entry.
    const RESULT_KEY: &'static str;

    /// Target entry to send with the command so the agent knows the shape.
    fn target(example: JsonValue) -> JsonValue {
        let mut target = serde_json::Map::new();
        target.insert(Self::RESULT_KEY.to_string(), example);
        target.insert("version".to_string(), JsonValue::from(CONTRACT_VERSION));
        JsonValue::Object(target)
    }
}

/// Extract a typed result from a command's results.
pub fn extract_result<T: ResultContract>(command: &Command) -> CommandResult<T> {
    let invalid = |reason: String| CommandError::InvalidResult {
        command_id: command.id.clone(),
        reason,
    };

    let entry = command
        .results
        .iter()
        .filter_map(JsonValue::as_object)
        .find(|obj| obj.contains_key(T::RESULT_KEY))
        .ok_or_else(|| invalid(format!("no result carries `{}`", T::RESULT_KEY)))?;

    match entry.get("version") {
        None => {}
        Some(v) if v.as_u64() == Some(CONTRACT_VERSION) => {}
        Some(other) => {
            return Err(invalid(format!(
                "unsupported contract version {} for `{}`",
                other,
                T::RESULT_KEY
            )))
        }
    }

    let value = entry
        .get(T::RESULT_KEY)
        .cloned()
        .unwrap_or(JsonValue::Null);
    serde_json::from_value(value)
        .map_err(|e| invalid(format!("`{}` has the wrong shape: {}", T::RESULT_KEY, e)))
}

// ============================================================================
// CONTRACTS
// ============================================================================

/// Phase 1 of the follow-up pipeline: the sales agent's draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpContent {
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

impl ResultContract for FollowUpContent {
    const RESULT_KEY: &'static str = "follow_up_content";
}

/// Phase 2 of the follow-up pipeline: the copywriter's rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

impl ResultContract for RefinedContent {
    const RESULT_KEY: &'static str = "refined_content";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLead {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl GeneratedLead {
    /// A lead is usable when it has a name and at least one way to reach it.
    pub fn is_usable(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        !self.name.trim().is_empty() && (present(&self.email) || present(&self.phone))
    }
}

/// Newtype so the list itself is the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedLeads(pub Vec<GeneratedLead>);

impl ResultContract for GeneratedLeads {
    const RESULT_KEY: &'static str = "generated_leads";
}

/// One pick of the selection agent. Ids and priorities are kept as sent so
/// that a single bad pick can be discarded without losing the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedLead {
    pub lead_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub priority: Option<String>,
}

impl SelectedLead {
    /// The picked lead id, if it is a UUID.
    pub fn lead_uuid(&self) -> Option<EntityId> {
        parse_uuid("lead_id", &self.lead_id).ok()
    }

    /// The stated priority; unknown or missing values become `None`.
    pub fn priority(&self) -> Option<Priority> {
        self.priority.as_deref().and_then(|p| p.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectedLeads(pub Vec<SelectedLead>);

impl ResultContract for SelectedLeads {
    const RESULT_KEY: &'static str = "selected_leads";
}

/// Reply of the robot instance assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantResponse {
    pub message: String,
    #[serde(default)]
    pub actions: Vec<JsonValue>,
}

impl ResultContract for AssistantResponse {
    const RESULT_KEY: &'static str = "assistant_response";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uncodie_core::CommandStatus;

    fn command(results: Vec<JsonValue>) -> Command {
        Command {
            id: "cmd_1".to_string(),
            status: CommandStatus::Completed,
            results,
            ..Default::default()
        }
    }

    #[test]
    fn test_extracts_first_matching_entry() {
        let cmd = command(vec![
            json!("log line"),
            json!({ "other": 1 }),
            json!({ "follow_up_content": { "channel": "whatsapp", "message": "Hola" }, "version": 1 }),
        ]);
        let content: FollowUpContent = extract_result(&cmd).unwrap();
        assert_eq!(content.channel, Channel::Whatsapp);
        assert_eq!(content.message, "Hola");
        assert_eq!(content.subject, None);
    }

    #[test]
    fn test_missing_key_is_invalid_result() {
        let err = extract_result::<RefinedContent>(&command(vec![json!({ "content": "x" })]))
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidResult { ref command_id, .. } if command_id == "cmd_1"));
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let cmd = command(vec![json!({
            "assistant_response": { "message": "ok" },
            "version": 2
        })]);
        assert!(extract_result::<AssistantResponse>(&cmd).is_err());
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        let cmd = command(vec![json!({ "follow_up_content": "just a string" })]);
        assert!(extract_result::<FollowUpContent>(&cmd).is_err());
    }

    #[test]
    fn test_list_contracts() {
        let lead_id = uncodie_core::new_entity_id();
        let cmd = command(vec![json!({
            "selected_leads": [{ "lead_id": lead_id, "reason": "warm", "priority": "high" }]
        })]);
        let SelectedLeads(selected) = extract_result(&cmd).unwrap();
        assert_eq!(selected[0].lead_uuid(), Some(lead_id));
        assert_eq!(selected[0].priority(), Some(Priority::High));

        let cmd = command(vec![json!({
            "generated_leads": [
                { "name": "Ana", "email": "ana@acme.test" },
                { "name": "", "email": "anon@acme.test" },
                { "name": "Bob" }
            ]
        })]);
        let GeneratedLeads(leads) = extract_result(&cmd).unwrap();
        let usable: Vec<_> = leads.iter().filter(|l| l.is_usable()).collect();
        assert_eq!(usable.len(), 1);
    }

    #[test]
    fn test_mixed_case_values_are_accepted() {
        let cmd = command(vec![json!({
            "follow_up_content": { "channel": "WhatsApp", "message": "Hola" }
        })]);
        let content: FollowUpContent = extract_result(&cmd).unwrap();
        assert_eq!(content.channel, Channel::Whatsapp);

        let cmd = command(vec![json!({
            "refined_content": { "channel": "EMAIL", "message": "Hola" }
        })]);
        let refined: RefinedContent = extract_result(&cmd).unwrap();
        assert_eq!(refined.channel, Some(Channel::Email));

        let cmd = command(vec![json!({
            "follow_up_content": { "channel": "carrier pigeon", "message": "Hola" }
        })]);
        assert!(extract_result::<FollowUpContent>(&cmd).is_err());
    }

    #[test]
    fn test_bad_selection_items_do_not_fail_the_contract() {
        let lead_id = uncodie_core::new_entity_id();
        let cmd = command(vec![json!({
            "selected_leads": [
                { "lead_id": lead_id, "reason": "warm", "priority": "High" },
                { "lead_id": "lead-42", "reason": "made up", "priority": "asap" }
            ]
        })]);
        let SelectedLeads(selected) = extract_result(&cmd).unwrap();

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].lead_uuid(), Some(lead_id));
        assert_eq!(selected[0].priority(), Some(Priority::High));
        assert_eq!(selected[1].lead_uuid(), None);
        assert_eq!(selected[1].priority(), None);
    }

    #[test]
    fn test_target_carries_version() {
        let target = FollowUpContent::target(json!({ "channel": "email", "message": "" }));
        assert_eq!(target["version"], json!(CONTRACT_VERSION));
        assert!(target.get("follow_up_content").is_some());
    }
}
