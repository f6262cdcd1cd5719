//! Uncodie Test Utilities
//!
//! Shared test infrastructure for the Uncodie workspace:
//! - Entity fixtures and a seeded [`SalesWorld`]
//! - [`MockCommandService`], a scripted agent framework
//! - Proptest generators

pub mod commands;
pub mod fixtures;
pub mod generators;

pub use commands::MockCommandService;
pub use fixtures::*;

// Re-export mock storage from its source crate
pub use uncodie_storage::{MockStore, SalesStore};

pub use uncodie_core::{
    agent_roles, Agent, Channel, Command, CommandStatus, EntityId, Lead, Profile, Site,
    SiteChannels, SiteSettings, TeamMember,
};
