//! Uncodie Context - Prompt Context Assembly
//!
//! Pure functions turning store rows into the text context submitted with
//! each agent command. Contexts are built from titled sections with
//! priorities; when the character budget runs out, low priority sections
//! are truncated at sentence or word boundaries, or dropped.

pub mod builder;
pub mod prompts;
pub mod sections;

pub use builder::{truncate_to_char_budget, ContextBuilder, ContextSection, DEFAULT_CONTEXT_BUDGET};
pub use prompts::{
    assistant_context, copywriter_context, follow_up_context, lead_generation_context,
    lead_selection_context, FollowUpInput, LeadGenerationInput,
};
pub use sections::{
    attribution_score, channels_context, conversation_history_context, lead_context, rank_team,
    site_context, team_attribution_context,
};
