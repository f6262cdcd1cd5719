//! Scripted agent framework.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uncodie_commands::{CommandRequest, CommandResult, CommandService};
use uncodie_core::{Command, CommandError, CommandStatus};

#[derive(Debug, Clone)]
enum Script {
    Complete(Vec<JsonValue>),
    Fail(Vec<JsonValue>),
    Hang,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    submitted: Vec<CommandRequest>,
    scripts: HashMap<String, Script>,
    commands: HashMap<String, Command>,
    submit_error: Option<CommandError>,
}

/// Mock [`CommandService`].
///
/// Each task is scripted up front; a submitted command immediately takes
/// its scripted final state, so the first lookup observes it. Unscripted
/// tasks stay `running` forever.
#[derive(Debug, Default)]
pub struct MockCommandService {
    state: Mutex<State>,
}

impl MockCommandService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Commands for `task` complete with `results`.
    pub fn complete(&self, task: &str, results: Vec<JsonValue>) -> &Self {
        self.state()
            .scripts
            .insert(task.to_string(), Script::Complete(results));
        self
    }

    /// Commands for `task` fail, optionally still carrying `results`.
    pub fn fail(&self, task: &str, results: Vec<JsonValue>) -> &Self {
        self.state()
            .scripts
            .insert(task.to_string(), Script::Fail(results));
        self
    }

    /// Commands for `task` never finish.
    pub fn hang(&self, task: &str) -> &Self {
        self.state().scripts.insert(task.to_string(), Script::Hang);
        self
    }

    /// Every submission fails with `error`.
    pub fn reject_submissions(&self, error: CommandError) {
        self.state().submit_error = Some(error);
    }

    /// Make a command visible to lookups without submitting it.
    pub fn insert(&self, command: Command) {
        self.state().commands.insert(command.id.clone(), command);
    }

    pub fn submitted(&self) -> Vec<CommandRequest> {
        self.state().submitted.clone()
    }

    pub fn submitted_tasks(&self) -> Vec<String> {
        self.state()
            .submitted
            .iter()
            .map(|r| r.task.clone())
            .collect()
    }
}

#[async_trait]
impl CommandService for MockCommandService {
    async fn submit_command(&self, request: &CommandRequest) -> CommandResult<Command> {
        let mut state = self.state();
        if let Some(error) = state.submit_error.clone() {
            return Err(error);
        }

        state.next_id += 1;
        let id = format!("cmd_{}", state.next_id);
        state.submitted.push(request.clone());

        let (status, results) = match state.scripts.get(&request.task).cloned() {
            Some(Script::Complete(results)) => (CommandStatus::Completed, results),
            Some(Script::Fail(results)) => (CommandStatus::Failed, results),
            Some(Script::Hang) | None => (CommandStatus::Running, Vec::new()),
        };
        state.commands.insert(
            id.clone(),
            Command {
                id: id.clone(),
                status,
                results,
                ..Default::default()
            },
        );

        Ok(Command {
            id,
            status: CommandStatus::Pending,
            ..Default::default()
        })
    }

    async fn get_command_by_id(&self, command_id: &str) -> CommandResult<Option<Command>> {
        Ok(self.state().commands.get(command_id).cloned())
    }
}
