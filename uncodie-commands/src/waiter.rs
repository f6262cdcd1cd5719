//! Waiting for a command to finish.
//!
//! A waiter subscribes to the [`CompletionHub`] before its first lookup, then
//! alternates between polling the framework and sleeping on the backoff
//! interval. A pushed terminal snapshot for the same id ends the sleep early
//! and is confirmed by an immediate lookup; the pushed body itself is never
//! taken as the outcome. The wait ends on a terminal status, when attempts
//! or the deadline run out, or when the cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uncodie_core::{Command, CommandError, CommandStatus};

use crate::backoff::Backoff;
use crate::hub::{matches_id, CompletionHub};
use crate::request::CommandRequest;
use crate::service::CommandService;
use crate::CommandResult;

// ============================================================================
// POLICY
// ============================================================================

/// Bounds on a single wait.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Overall limit for one wait, independent of attempts.
    pub deadline: Duration,
    /// Treat `failed` with non-empty results as done.
    pub accept_failed_with_results: bool,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            backoff: Backoff::default(),
            deadline: Duration::from_secs(280),
            accept_failed_with_results: true,
        }
    }
}

impl WaitPolicy {
    /// Load from environment variables.
    ///
    /// - `UNCODIE_COMMAND_MAX_ATTEMPTS` (default: 100)
    /// - `UNCODIE_COMMAND_POLL_MS`: base interval (default: 1000)
    /// - `UNCODIE_COMMAND_POLL_MAX_MS`: interval cap (default: 5000)
    /// - `UNCODIE_COMMAND_BACKOFF`: `exponential` or `fixed` (default: exponential)
    /// - `UNCODIE_COMMAND_DEADLINE_SECS` (default: 280)
    /// - `UNCODIE_COMMAND_ACCEPT_FAILED_WITH_RESULTS` (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let parse = |key: &str| std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok());

        let max_attempts = std::env::var("UNCODIE_COMMAND_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &u32| *n > 0)
            .unwrap_or(defaults.max_attempts);

        let base_ms = parse("UNCODIE_COMMAND_POLL_MS").unwrap_or(1_000);
        let max_ms = parse("UNCODIE_COMMAND_POLL_MAX_MS").unwrap_or(5_000).max(base_ms);

        let backoff = match std::env::var("UNCODIE_COMMAND_BACKOFF")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Ok("fixed") => Backoff::Fixed { delay_ms: base_ms },
            _ => Backoff::Exponential {
                base_ms,
                multiplier: 1.5,
                max_ms,
            },
        };

        let deadline = parse("UNCODIE_COMMAND_DEADLINE_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.deadline);

        let accept_failed_with_results = std::env::var("UNCODIE_COMMAND_ACCEPT_FAILED_WITH_RESULTS")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            max_attempts,
            backoff,
            deadline,
            accept_failed_with_results,
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Why a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Completed,
    /// `failed` but with results, accepted as done.
    FailedWithResults,
    Failed,
    Cancelled,
    AttemptsExhausted,
    DeadlineExceeded,
}

/// Outcome of [`CompletionWaiter::wait`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommandCompletion {
    pub completed: bool,
    /// Last observed snapshot.
    pub command: Option<Command>,
    pub attempts: u32,
    pub reason: CompletionReason,
}

impl CommandCompletion {
    /// Last observed status, `pending` when nothing was observed.
    pub fn last_status(&self) -> CommandStatus {
        self.command
            .as_ref()
            .map(|c| c.status)
            .unwrap_or_default()
    }

    /// The completed snapshot, or the matching error.
    pub fn into_completed(self, command_id: &str) -> CommandResult<Command> {
        match (self.completed, self.command) {
            (true, Some(command)) => Ok(command),
            (_, command) => {
                let status = command.map(|c| c.status).unwrap_or_default();
                if matches!(status, CommandStatus::Failed | CommandStatus::Cancelled) {
                    Err(CommandError::Failed {
                        command_id: command_id.to_string(),
                    })
                } else {
                    Err(CommandError::NotCompleted {
                        command_id: command_id.to_string(),
                        status: status.as_str().to_string(),
                    })
                }
            }
        }
    }
}

// ============================================================================
// WAITER
// ============================================================================

/// Waits for commands using push snapshots plus backoff polling.
#[derive(Clone)]
pub struct CompletionWaiter {
    service: Arc<dyn CommandService>,
    hub: CompletionHub,
    policy: WaitPolicy,
}

impl std::fmt::Debug for CompletionWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionWaiter")
            .field("policy", &self.policy)
            .finish()
    }
}

impl CompletionWaiter {
    pub fn new(service: Arc<dyn CommandService>, hub: CompletionHub, policy: WaitPolicy) -> Self {
        Self {
            service,
            hub,
            policy,
        }
    }

    pub fn service(&self) -> &Arc<dyn CommandService> {
        &self.service
    }

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Submit a command and wait for it.
    ///
    /// Returns the id the framework assigned together with the wait outcome.
    pub async fn submit_and_wait(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
    ) -> CommandResult<(String, CommandCompletion)> {
        let submitted = self.service.submit_command(request).await?;
        let command_id = submitted.id.clone();
        let completion = self.wait(&command_id, cancel.clone()).await;
        Ok((command_id, completion))
    }

    /// Wait for `command_id` to reach a terminal state.
    pub async fn wait(&self, command_id: &str, cancel: CancellationToken) -> CommandCompletion {
        let mut rx = self.hub.subscribe();
        let mut push_open = true;
        let deadline = Instant::now() + self.policy.deadline;
        let mut last: Option<Command> = None;
        let mut attempts: u32 = 0;

        let finish = |completed, command, attempts, reason| CommandCompletion {
            completed,
            command,
            attempts,
            reason,
        };

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(command_id, attempts, "Command wait cancelled");
                return finish(false, last, attempts, CompletionReason::Cancelled);
            }

            attempts += 1;
            match self.service.get_command_by_id(command_id).await {
                Ok(Some(command)) => {
                    if let Some((completed, reason)) = self.classify(&command) {
                        self.log_outcome(command_id, attempts, reason);
                        return finish(completed, Some(command), attempts, reason);
                    }
                    last = Some(command);
                }
                Ok(None) => {
                    tracing::debug!(command_id, attempts, "Command not visible yet");
                }
                Err(e) => {
                    tracing::warn!(command_id, attempts, error = %e, "Command lookup failed");
                }
            }

            if attempts >= self.policy.max_attempts {
                tracing::warn!(command_id, attempts, "Command wait exhausted its attempts");
                return finish(false, last, attempts, CompletionReason::AttemptsExhausted);
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(command_id, attempts, "Command wait hit its deadline");
                return finish(false, last, attempts, CompletionReason::DeadlineExceeded);
            }

            let delay = self
                .policy
                .backoff
                .delay_for_attempt(attempts - 1)
                .min(deadline - now);
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(command_id, attempts, "Command wait cancelled");
                        return finish(false, last, attempts, CompletionReason::Cancelled);
                    }
                    _ = &mut sleep => break,
                    pushed = rx.recv(), if push_open => match pushed {
                        Ok(command) if matches_id(&command, command_id) && command.status.is_terminal() => {
                            tracing::debug!(command_id, status = %command.status, "Pushed snapshot, confirming with a lookup");
                            break;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(command_id, skipped, "Completion hub lagged, polling now");
                            break;
                        }
                        Err(RecvError::Closed) => push_open = false,
                    },
                }
            }
        }
    }

    /// `Some((completed, reason))` when the snapshot ends the wait.
    fn classify(&self, command: &Command) -> Option<(bool, CompletionReason)> {
        match command.status {
            CommandStatus::Completed => Some((true, CompletionReason::Completed)),
            CommandStatus::Failed
                if self.policy.accept_failed_with_results && command.has_results() =>
            {
                Some((true, CompletionReason::FailedWithResults))
            }
            CommandStatus::Failed | CommandStatus::Cancelled => {
                Some((false, CompletionReason::Failed))
            }
            CommandStatus::Pending | CommandStatus::Running | CommandStatus::Unknown => None,
        }
    }

    fn log_outcome(&self, command_id: &str, attempts: u32, reason: CompletionReason) {
        match reason {
            CompletionReason::FailedWithResults => tracing::warn!(
                command_id,
                attempts,
                "Command failed but returned results, treating as completed"
            ),
            CompletionReason::Failed => {
                tracing::warn!(command_id, attempts, "Command failed without results")
            }
            _ => tracing::info!(command_id, attempts, ?reason, "Command finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns scripted lookups in order, repeating the last one.
    struct Scripted {
        lookups: Mutex<VecDeque<CommandResult<Option<Command>>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(lookups: Vec<CommandResult<Option<Command>>>) -> Arc<Self> {
            Arc::new(Self {
                lookups: Mutex::new(lookups.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl CommandService for Scripted {
        async fn submit_command(&self, _request: &CommandRequest) -> CommandResult<Command> {
            Ok(snapshot(CommandStatus::Pending, vec![]))
        }

        async fn get_command_by_id(&self, _command_id: &str) -> CommandResult<Option<Command>> {
            *self.calls.lock().unwrap() += 1;
            let mut lookups = self.lookups.lock().unwrap();
            if lookups.len() > 1 {
                lookups.pop_front().unwrap()
            } else {
                lookups.front().cloned().unwrap()
            }
        }
    }

    fn snapshot(status: CommandStatus, results: Vec<serde_json::Value>) -> Command {
        Command {
            id: "cmd_1".to_string(),
            status,
            results,
            ..Default::default()
        }
    }

    fn waiter(service: Arc<Scripted>, policy: WaitPolicy) -> (CompletionWaiter, CompletionHub) {
        let hub = CompletionHub::default();
        (CompletionWaiter::new(service, hub.clone(), policy), hub)
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_polling() {
        let service = Scripted::new(vec![
            Ok(Some(snapshot(CommandStatus::Pending, vec![]))),
            Ok(Some(snapshot(CommandStatus::Running, vec![]))),
            Ok(Some(snapshot(CommandStatus::Completed, vec![json!({"ok": true})]))),
        ]);
        let (waiter, _hub) = waiter(service.clone(), WaitPolicy::default());

        let outcome = waiter.wait("cmd_1", CancellationToken::new()).await;
        assert!(outcome.completed);
        assert_eq!(outcome.reason, CompletionReason::Completed);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(service.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_with_results_counts_as_completed() {
        let service = Scripted::new(vec![Ok(Some(snapshot(
            CommandStatus::Failed,
            vec![json!({ "follow_up_content": { "channel": "email", "message": "hi" } })],
        )))]);
        let (waiter, _hub) = waiter(service, WaitPolicy::default());

        let outcome = waiter.wait("cmd_1", CancellationToken::new()).await;
        assert!(outcome.completed);
        assert_eq!(outcome.reason, CompletionReason::FailedWithResults);
        assert!(outcome.into_completed("cmd_1").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_with_results_rejected_when_disabled() {
        let service = Scripted::new(vec![Ok(Some(snapshot(
            CommandStatus::Failed,
            vec![json!({ "x": 1 })],
        )))]);
        let policy = WaitPolicy {
            accept_failed_with_results: false,
            ..Default::default()
        };
        let (waiter, _hub) = waiter(service, policy);

        let outcome = waiter.wait("cmd_1", CancellationToken::new()).await;
        assert!(!outcome.completed);
        assert_eq!(outcome.reason, CompletionReason::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_without_results_stops_immediately() {
        let service = Scripted::new(vec![Ok(Some(snapshot(CommandStatus::Failed, vec![])))]);
        let (waiter, _hub) = waiter(service.clone(), WaitPolicy::default());

        let outcome = waiter.wait("cmd_1", CancellationToken::new()).await;
        assert!(!outcome.completed);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(service.calls(), 1);
        assert!(matches!(
            outcome.into_completed("cmd_1"),
            Err(CommandError::Failed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_snapshot() {
        let service = Scripted::new(vec![
            Err(CommandError::LookupFailed {
                command_id: "cmd_1".to_string(),
                message: "503".to_string(),
            }),
            Ok(Some(snapshot(CommandStatus::Running, vec![]))),
        ]);
        let policy = WaitPolicy {
            max_attempts: 4,
            ..Default::default()
        };
        let (waiter, _hub) = waiter(service.clone(), policy);

        let outcome = waiter.wait("cmd_1", CancellationToken::new()).await;
        assert!(!outcome.completed);
        assert_eq!(outcome.reason, CompletionReason::AttemptsExhausted);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.last_status(), CommandStatus::Running);
        assert!(matches!(
            outcome.into_completed("cmd_1"),
            Err(CommandError::NotCompleted { ref status, .. }) if status == "running"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_the_wait() {
        let service = Scripted::new(vec![Ok(Some(snapshot(CommandStatus::Running, vec![])))]);
        let policy = WaitPolicy {
            max_attempts: 10_000,
            deadline: Duration::from_secs(12),
            ..Default::default()
        };
        let (waiter, _hub) = waiter(service, policy);

        let started = Instant::now();
        let outcome = waiter.wait("cmd_1", CancellationToken::new()).await;
        assert_eq!(outcome.reason, CompletionReason::DeadlineExceeded);
        assert!(started.elapsed() <= Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_snapshot_wakes_waiter() {
        let service = Scripted::new(vec![
            Ok(Some(snapshot(CommandStatus::Running, vec![]))),
            Ok(Some(snapshot(CommandStatus::Completed, vec![json!({"done": true})]))),
        ]);
        let policy = WaitPolicy {
            backoff: Backoff::Fixed { delay_ms: 60_000 },
            ..Default::default()
        };
        let (waiter, hub) = waiter(service.clone(), policy);

        let handle = tokio::spawn(async move { waiter.wait("cmd_1", CancellationToken::new()).await });
        tokio::task::yield_now().await;
        while hub.waiter_count() == 0 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        hub.publish(Command {
            id: "other".to_string(),
            status: CommandStatus::Completed,
            ..Default::default()
        });
        hub.publish(snapshot(CommandStatus::Completed, vec![json!({"done": true})]));

        let started = Instant::now();
        let outcome = handle.await.unwrap();
        assert!(outcome.completed);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(service.calls(), 2);
        assert_eq!(outcome.command.unwrap().results, vec![json!({"done": true})]);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pushed_snapshot_is_not_trusted_without_lookup() {
        let service = Scripted::new(vec![Ok(Some(snapshot(CommandStatus::Running, vec![])))]);
        let policy = WaitPolicy {
            max_attempts: 2,
            backoff: Backoff::Fixed { delay_ms: 60_000 },
            ..Default::default()
        };
        let (waiter, hub) = waiter(service.clone(), policy);

        let handle = tokio::spawn(async move { waiter.wait("cmd_1", CancellationToken::new()).await });
        while hub.waiter_count() == 0 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        hub.publish(snapshot(CommandStatus::Completed, vec![json!({"forged": true})]));

        let outcome = handle.await.unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.reason, CompletionReason::AttemptsExhausted);
        assert_eq!(outcome.last_status(), CommandStatus::Running);
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_ends_wait() {
        let service = Scripted::new(vec![Ok(Some(snapshot(CommandStatus::Running, vec![])))]);
        let (waiter, _hub) = waiter(service, WaitPolicy::default());
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        let handle = tokio::spawn(async move { waiter.wait("cmd_1", token).await });
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        drop(cancel.drop_guard());

        let outcome = handle.await.unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.reason, CompletionReason::Cancelled);
        assert_eq!(outcome.last_status(), CommandStatus::Running);
    }
}
