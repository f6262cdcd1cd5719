//! Uncodie Commands - Agent Framework Client
//!
//! Work for the AI agents is submitted to an external agent framework as a
//! *command*. This crate holds everything needed to talk to it:
//!
//! - [`CommandRequest`]: what to ask for (task, context, targets, tools)
//! - [`CommandService`]: the submit/lookup seam, with [`HttpCommandService`]
//!   as the production implementation
//! - [`CompletionWaiter`]: waits for a command using push snapshots from the
//!   [`CompletionHub`] with backoff polling as fallback
//! - [`contracts`]: the typed, versioned result shapes agents return

pub mod backoff;
pub mod contracts;
pub mod hub;
pub mod request;
pub mod service;
pub mod waiter;

pub use backoff::Backoff;
pub use contracts::{
    extract_result, AssistantResponse, FollowUpContent, GeneratedLead, GeneratedLeads,
    RefinedContent, ResultContract, SelectedLead, SelectedLeads, CONTRACT_VERSION,
};
pub use hub::CompletionHub;
pub use request::{CommandRequest, CommandRequestBuilder};
pub use service::{CommandService, CommandServiceConfig, HttpCommandService};
pub use waiter::{CommandCompletion, CompletionReason, CompletionWaiter, WaitPolicy};

use uncodie_core::CommandError;

/// Result type alias for agent framework operations.
pub type CommandResult<T> = Result<T, CommandError>;
