//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use uncodie_agents::{SalesAgents, WorkflowSettings};
use uncodie_commands::{CommandService, CompletionHub, CompletionWaiter, WaitPolicy};
use uncodie_storage::SalesStore;

use crate::config::AppConfig;
use crate::email::EmailClient;
use crate::notify::TeamNotifier;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SalesStore>,
    /// Agent framework client, also used for command lookups.
    pub commands: Arc<dyn CommandService>,
    /// Receives pushed completion snapshots and wakes waiting workflows.
    pub hub: CompletionHub,
    pub agents: SalesAgents,
    pub email: Arc<dyn EmailClient>,
    pub notifier: TeamNotifier,
    /// HMAC secret for `/api/commands/completion`; `None` accepts unsigned callbacks.
    pub callback_secret: Option<Arc<str>>,
    pub start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("agents", &self.agents)
            .field("callback_secret", &self.callback_secret.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn SalesStore>,
        commands: Arc<dyn CommandService>,
        email: Arc<dyn EmailClient>,
        policy: WaitPolicy,
        callback_secret: Option<String>,
    ) -> Self {
        let hub = CompletionHub::default();
        let waiter = CompletionWaiter::new(commands.clone(), hub.clone(), policy);
        let agents = SalesAgents::new(
            store.clone(),
            waiter,
            WorkflowSettings {
                robot_provider: config.robot_provider.clone(),
            },
        );
        let notifier = TeamNotifier::new(store.clone(), email.clone());

        Self {
            config: Arc::new(config),
            store,
            commands,
            hub,
            agents,
            email,
            notifier,
            callback_secret: callback_secret.map(Arc::from),
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<AppConfig>, config);
crate::impl_from_ref!(Arc<dyn SalesStore>, store);
crate::impl_from_ref!(Arc<dyn CommandService>, commands);
crate::impl_from_ref!(CompletionHub, hub);
crate::impl_from_ref!(SalesAgents, agents);
crate::impl_from_ref!(TeamNotifier, notifier);
