//! Robot instance assistant.

use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uncodie_commands::{extract_result, AssistantResponse, CommandRequest, ResultContract};
use uncodie_context::assistant_context;
use uncodie_core::{agent_roles, EntityId, StorageError, UncodieResult, ValidationError};

use crate::{tasks, SalesAgents};

/// Provider used when `ROBOT_SDK_PROVIDER` is unset.
pub const DEFAULT_ROBOT_PROVIDER: &str = "scrapybara";

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantRequest {
    pub site_id: EntityId,
    pub instance_id: EntityId,
    pub message: String,
    pub user_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AssistantOutcome {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub instance_id: EntityId,
    pub command_id: String,
    pub provider: String,
    pub message: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub actions: Vec<serde_json::Value>,
}

impl SalesAgents {
    /// Relay a user request to the assistant of a remote robot instance.
    #[tracing::instrument(skip(self, request, cancel), fields(site_id = %request.site_id, instance_id = %request.instance_id))]
    pub async fn robot_assistant(
        &self,
        request: AssistantRequest,
        cancel: &CancellationToken,
    ) -> UncodieResult<AssistantOutcome> {
        let site = self.require_site(request.site_id).await?;
        let instance = self
            .store
            .remote_instance_get(request.instance_id)
            .await?
            .filter(|i| i.site_id == site.id)
            .ok_or(StorageError::NotFound {
                entity: "RemoteInstance",
                id: request.instance_id,
            })?;
        if !instance.is_usable() {
            return Err(ValidationError::InvalidValue {
                field: "instance_id".to_string(),
                reason: format!("instance is {}", instance.status),
            }
            .into());
        }

        let agent = self
            .store
            .active_agent_for_role(site.id, agent_roles::ROBOT)
            .await?;
        // The instance's own provider wins over the configured default.
        let provider = instance
            .provider
            .clone()
            .unwrap_or_else(|| self.settings.robot_provider.clone());

        let mut builder = CommandRequest::builder(tasks::ROBOT_ASSISTANT, site.id)
            .description(format!("Assist on instance {}", instance.name))
            .user_id(request.user_id.or(Some(site.user_id)))
            .context(assistant_context(&site, &instance, &provider, &request.message))
            .target(AssistantResponse::target(json!({
                "message": "reply to the user",
                "actions": []
            })))
            .metadata("instance_id", json!(instance.id))
            .metadata("provider", json!(provider));
        if let Some(agent) = &agent {
            builder = builder.agent_id(agent.id);
        }

        let (command_id, completion) = self
            .waiter
            .submit_and_wait(&builder.build(), cancel)
            .await?;
        let snapshot = completion.into_completed(&command_id)?;
        let response: AssistantResponse = extract_result(&snapshot)?;

        Ok(AssistantOutcome {
            instance_id: instance.id,
            command_id,
            provider,
            message: response.message,
            actions: response.actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uncodie_commands::{Backoff, CompletionHub, CompletionWaiter, WaitPolicy};
    use uncodie_core::{new_entity_id, RemoteInstance, UncodieError};
    use uncodie_test_utils::{MockCommandService, SalesWorld};

    fn agents(world: &SalesWorld, service: Arc<MockCommandService>) -> SalesAgents {
        let policy = WaitPolicy {
            max_attempts: 3,
            backoff: Backoff::Fixed { delay_ms: 10 },
            ..Default::default()
        };
        let waiter = CompletionWaiter::new(service, CompletionHub::default(), policy);
        SalesAgents::new(Arc::new(world.store.clone()), waiter, Default::default())
    }

    fn instance(world: &SalesWorld, status: &str) -> RemoteInstance {
        let instance = RemoteInstance {
            id: new_entity_id(),
            site_id: world.site.id,
            name: "browser-1".to_string(),
            status: status.to_string(),
            provider: None,
        };
        world.store.insert_instance(instance.clone());
        instance
    }

    #[tokio::test(start_paused = true)]
    async fn test_assistant_reply() {
        let world = SalesWorld::seed();
        let instance = instance(&world, "running");
        let service = Arc::new(MockCommandService::new());
        service.complete(
            tasks::ROBOT_ASSISTANT,
            vec![json!({ "assistant_response": { "message": "Opened pricing", "actions": [{ "type": "navigate" }] } })],
        );

        let outcome = agents(&world, service.clone())
            .robot_assistant(
                AssistantRequest {
                    site_id: world.site.id,
                    instance_id: instance.id,
                    message: "Open pricing".to_string(),
                    user_id: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.provider, DEFAULT_ROBOT_PROVIDER);
        assert_eq!(outcome.message, "Opened pricing");
        assert_eq!(outcome.actions.len(), 1);
        assert!(service.submitted()[0].context.contains("Open pricing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_instance_provider_is_used_everywhere() {
        let world = SalesWorld::seed();
        let mut browser = instance(&world, "running");
        browser.provider = Some("browserbase".to_string());
        world.store.insert_instance(browser.clone());
        let service = Arc::new(MockCommandService::new());
        service.complete(
            tasks::ROBOT_ASSISTANT,
            vec![json!({ "assistant_response": { "message": "Done" } })],
        );

        let outcome = agents(&world, service.clone())
            .robot_assistant(
                AssistantRequest {
                    site_id: world.site.id,
                    instance_id: browser.id,
                    message: "Scroll down".to_string(),
                    user_id: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let submitted = &service.submitted()[0];
        assert_eq!(outcome.provider, "browserbase");
        assert_eq!(submitted.metadata["provider"], json!("browserbase"));
        assert!(submitted.context.contains("- Provider: browserbase"));
        assert!(!submitted.context.contains(DEFAULT_ROBOT_PROVIDER));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_instance_rejected() {
        let world = SalesWorld::seed();
        let instance = instance(&world, "stopped");
        let service = Arc::new(MockCommandService::new());

        let err = agents(&world, service.clone())
            .robot_assistant(
                AssistantRequest {
                    site_id: world.site.id,
                    instance_id: instance.id,
                    message: "hi".to_string(),
                    user_id: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UncodieError::Validation(_)));
        assert!(service.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_instance_of_other_site_not_found() {
        let world = SalesWorld::seed();
        let other = SalesWorld::seed();
        let foreign = instance(&other, "running");
        world.store.insert_instance(foreign.clone());
        let service = Arc::new(MockCommandService::new());

        let err = agents(&world, service)
            .robot_assistant(
                AssistantRequest {
                    site_id: world.site.id,
                    instance_id: foreign.id,
                    message: "hi".to_string(),
                    user_id: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UncodieError::Storage(StorageError::NotFound { entity: "RemoteInstance", .. })
        ));
    }
}
