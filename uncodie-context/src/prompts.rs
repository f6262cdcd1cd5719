//! Full prompt contexts for each agent task.

use std::fmt::Write;

use uncodie_commands::FollowUpContent;
use uncodie_core::{
    Agent, ConversationHistory, Lead, RemoteInstance, Segment, Site, SiteChannels, SiteSettings,
    TeamMemberStats,
};

use crate::builder::ContextBuilder;
use crate::sections::{
    channels_context, conversation_history_context, lead_context, site_context,
    team_attribution_context,
};

// Section priorities. Task instructions always survive the budget.
const TASK: i32 = 100;
const LEAD: i32 = 90;
const CHANNELS: i32 = 85;
const SITE: i32 = 70;
const DRAFT: i32 = 95;
const HISTORY: i32 = 50;
const TEAM: i32 = 30;

/// Inputs for the sales agent's follow-up draft.
#[derive(Debug, Clone, Copy)]
pub struct FollowUpInput<'a> {
    pub site: &'a Site,
    pub lead: &'a Lead,
    pub segment: Option<&'a Segment>,
    pub channels: &'a SiteChannels,
    pub history: &'a [ConversationHistory],
    pub team: &'a [TeamMemberStats],
    pub agent: &'a Agent,
}

pub fn follow_up_context(input: FollowUpInput<'_>) -> String {
    let task = format!(
        "You are {}, the sales specialist for {}. Review the lead and its history and \
         write the next follow-up message. Pick exactly one of the configured channels \
         the lead can be reached on. Keep the tone personal and concise, and include a \
         clear next step.",
        input.agent.name, input.site.name
    );

    ContextBuilder::default()
        .fixed_section("Task", task, TASK)
        .section("Lead", lead_context(input.lead, input.segment), LEAD)
        .fixed_section("Channels", channels_context(input.channels), CHANNELS)
        .section("Company", site_context(input.site), SITE)
        .section(
            "Conversation history",
            conversation_history_context(input.history),
            HISTORY,
        )
        .section("Team", team_attribution_context(input.team), TEAM)
        .build()
}

/// Context for the copywriter refining a phase-1 draft.
pub fn copywriter_context(draft: &FollowUpContent, lead: &Lead, site: &Site) -> String {
    let task = format!(
        "Polish the follow-up below for {} without changing its intent, facts or call \
         to action. The message will be sent by {}; keep it suitable for that channel \
         and do not switch channels.",
        lead.name, draft.channel
    );

    let mut body = String::new();
    let _ = writeln!(body, "- Channel: {}", draft.channel);
    if let Some(subject) = draft.subject.as_deref() {
        let _ = writeln!(body, "- Subject: {}", subject);
    }
    if let Some(strategy) = draft.strategy.as_deref() {
        let _ = writeln!(body, "- Strategy: {}", strategy);
    }
    let _ = writeln!(body, "\n{}", draft.message);

    ContextBuilder::default()
        .fixed_section("Task", task, TASK)
        .fixed_section("Draft", body, DRAFT)
        .section("Lead", lead_context(lead, None), LEAD)
        .section("Company", site_context(site), SITE)
        .build()
}

/// Inputs for lead generation.
#[derive(Debug, Clone, Copy)]
pub struct LeadGenerationInput<'a> {
    pub site: &'a Site,
    pub settings: Option<&'a SiteSettings>,
    pub segments: &'a [Segment],
    pub target_segment: Option<&'a Segment>,
    pub existing_leads: i64,
    pub max_leads: usize,
}

pub fn lead_generation_context(input: LeadGenerationInput<'_>) -> String {
    let task = format!(
        "Research and propose up to {} new leads for {}. Each lead needs a name and at \
         least an email or a phone number. Do not repeat leads the company already has.",
        input.max_leads, input.site.name
    );

    let mut profile = String::new();
    if let Some(settings) = input.settings {
        for (label, value) in [
            ("Ideal customer profile", settings.icp.as_deref()),
            ("Industry", settings.industry.as_deref()),
            ("Company size", settings.company_size.as_deref()),
        ] {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                let _ = writeln!(profile, "- {}: {}", label, value.trim());
            }
        }
    }
    let _ = writeln!(profile, "- Existing leads: {}", input.existing_leads);

    let segments = match input.target_segment {
        Some(segment) => segment_line(segment),
        None => input.segments.iter().map(segment_line).collect(),
    };

    ContextBuilder::default()
        .fixed_section("Task", task, TASK)
        .section("Company", site_context(input.site), SITE + 10)
        .section("Targeting", profile, SITE)
        .section(
            if input.target_segment.is_some() {
                "Target segment"
            } else {
                "Segments"
            },
            segments,
            HISTORY,
        )
        .build()
}

fn segment_line(segment: &Segment) -> String {
    let mut out = format!("- {} ({})", segment.name, segment.id);
    if let Some(description) = segment.description.as_deref() {
        let _ = write!(out, ": {}", description.trim());
    }
    out.push('\n');
    out
}

/// Context for choosing which candidates to work next.
pub fn lead_selection_context(
    site: &Site,
    candidates: &[Lead],
    segment: Option<&Segment>,
    limit: usize,
) -> String {
    let task = format!(
        "Select the most promising leads to follow up next for {} (at most {}). \
         Only choose from the candidates listed, referencing them by lead ID, and \
         explain each choice briefly.",
        site.name, limit
    );

    let mut list = String::new();
    for lead in candidates {
        let _ = writeln!(
            list,
            "- {} | {} | {} | status {} | added {}",
            lead.id,
            lead.name,
            lead.company.as_deref().unwrap_or("-"),
            lead.status,
            lead.created_at.format("%Y-%m-%d"),
        );
    }

    let mut builder = ContextBuilder::default()
        .fixed_section("Task", task, TASK)
        .section("Candidates", list, LEAD)
        .section("Company", site_context(site), SITE);
    if let Some(segment) = segment {
        builder = builder.section("Segment", segment_line(segment), CHANNELS);
    }
    builder.build()
}

/// Context for the robot instance assistant.
pub fn assistant_context(
    site: &Site,
    instance: &RemoteInstance,
    provider: &str,
    message: &str,
) -> String {
    let task = "Answer the user's request about this remote browser instance. \
                Describe any actions you would take on the instance.";

    let mut details = String::new();
    let _ = writeln!(details, "- Instance: {} ({})", instance.name, instance.id);
    let _ = writeln!(details, "- Status: {}", instance.status);
    let _ = writeln!(details, "- Provider: {}", provider);

    ContextBuilder::default()
        .fixed_section("Task", task, TASK)
        .section("User request", message, DRAFT)
        .section("Instance", details, LEAD)
        .section("Company", site_context(site), SITE)
        .build()
}
