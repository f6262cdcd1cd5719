//! Fan-out of command snapshots pushed by the agent framework.

use tokio::sync::broadcast;
use uncodie_core::Command;

const DEFAULT_CAPACITY: usize = 256;

/// Broadcasts completion callbacks to every waiter.
///
/// Waiters filter by command id; a lagging receiver falls back to polling.
#[derive(Debug, Clone)]
pub struct CompletionHub {
    tx: broadcast::Sender<Command>,
}

impl CompletionHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Command> {
        self.tx.subscribe()
    }

    /// Publish a snapshot, returning the number of waiters that received it.
    pub fn publish(&self, command: Command) -> usize {
        self.tx.send(command).unwrap_or(0)
    }

    pub fn waiter_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for CompletionHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Whether a pushed snapshot is the command identified by `command_id`.
pub(crate) fn matches_id(command: &Command, command_id: &str) -> bool {
    command.id == command_id
        || command
            .metadata
            .db_uuid
            .is_some_and(|id| id.to_string() == command_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uncodie_core::CommandStatus;

    #[tokio::test]
    async fn test_publish_without_waiters_is_noop() {
        let hub = CompletionHub::default();
        assert_eq!(hub.publish(Command::default()), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_snapshot() {
        let hub = CompletionHub::default();
        let mut rx = hub.subscribe();
        let command = Command {
            id: "cmd_1".to_string(),
            status: CommandStatus::Completed,
            ..Default::default()
        };
        assert_eq!(hub.publish(command.clone()), 1);
        assert_eq!(rx.recv().await.unwrap(), command);
    }

    #[test]
    fn test_matches_db_uuid() {
        let db_uuid = uncodie_core::new_entity_id();
        let mut command = Command {
            id: "cmd_1".to_string(),
            ..Default::default()
        };
        command.metadata.db_uuid = Some(db_uuid);
        assert!(matches_id(&command, "cmd_1"));
        assert!(matches_id(&command, &db_uuid.to_string()));
        assert!(!matches_id(&command, "cmd_2"));
    }
}
