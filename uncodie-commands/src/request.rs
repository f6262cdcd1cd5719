//! Command submission payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uncodie_core::EntityId;

/// A command to submit to the agent framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub task: String,
    pub description: String,
    pub user_id: Option<EntityId>,
    pub site_id: EntityId,
    pub agent_id: Option<EntityId>,
    /// Prompt context assembled by the context builders.
    pub context: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, JsonValue>,
    /// Filled in by the service when push completion is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl CommandRequest {
    pub fn builder(task: impl Into<String>, site_id: EntityId) -> CommandRequestBuilder {
        CommandRequestBuilder::new(task, site_id)
    }
}

/// Builder for [`CommandRequest`].
#[derive(Debug, Clone)]
pub struct CommandRequestBuilder {
    request: CommandRequest,
}

impl CommandRequestBuilder {
    pub fn new(task: impl Into<String>, site_id: EntityId) -> Self {
        Self {
            request: CommandRequest {
                task: task.into(),
                description: String::new(),
                user_id: None,
                site_id,
                agent_id: None,
                context: String::new(),
                targets: Vec::new(),
                tools: Vec::new(),
                metadata: Map::new(),
                callback_url: None,
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.request.description = description.into();
        self
    }

    pub fn user_id(mut self, user_id: Option<EntityId>) -> Self {
        self.request.user_id = user_id;
        self
    }

    pub fn agent_id(mut self, agent_id: EntityId) -> Self {
        self.request.agent_id = Some(agent_id);
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.request.context = context.into();
        self
    }

    /// Add an expected output shape for the agent.
    pub fn target(mut self, target: JsonValue) -> Self {
        self.request.targets.push(target);
        self
    }

    pub fn tool(mut self, tool: JsonValue) -> Self {
        self.request.tools.push(tool);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.request.metadata.insert(key.into(), value);
        self
    }

    pub fn build(self) -> CommandRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uncodie_core::new_entity_id;

    #[test]
    fn test_builder_collects_fields() {
        let site_id = new_entity_id();
        let agent_id = new_entity_id();
        let request = CommandRequest::builder("lead follow-up", site_id)
            .description("Write the next message")
            .agent_id(agent_id)
            .context("Lead: Ana")
            .target(json!({ "follow_up_content": { "channel": "email" } }))
            .metadata("lead_id", json!("abc"))
            .build();

        assert_eq!(request.task, "lead follow-up");
        assert_eq!(request.agent_id, Some(agent_id));
        assert_eq!(request.targets.len(), 1);
        assert!(request.tools.is_empty());
        assert_eq!(request.metadata.get("lead_id"), Some(&json!("abc")));
    }

    #[test]
    fn test_empty_collections_are_skipped_on_the_wire() {
        let request = CommandRequest::builder("x", new_entity_id()).build();
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("metadata").is_none());
        assert!(value.get("callback_url").is_none());
    }
}
