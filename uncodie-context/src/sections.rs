//! Section bodies describing leads, channels, history and the team.

use std::fmt::Write;

use uncodie_core::{Channel, ConversationHistory, Lead, Segment, SiteChannels, Site, TeamMemberStats};

/// Messages shown per conversation.
pub const HISTORY_MESSAGES_PER_CONVERSATION: usize = 10;

fn line(out: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        let _ = writeln!(out, "- {}: {}", label, value);
    }
}

pub fn site_context(site: &Site) -> String {
    let mut out = String::new();
    line(&mut out, "Company", Some(&site.name));
    line(&mut out, "Website", site.url.as_deref());
    line(&mut out, "About", site.description.as_deref());
    out
}

/// Everything known about a lead.
pub fn lead_context(lead: &Lead, segment: Option<&Segment>) -> String {
    let mut out = String::new();
    line(&mut out, "Lead ID", Some(&lead.id.to_string()));
    line(&mut out, "Name", Some(&lead.name));
    line(&mut out, "Email", lead.contact_email());
    line(&mut out, "Phone", lead.contact_phone());
    line(&mut out, "Company", lead.company.as_deref());
    line(&mut out, "Position", lead.position.as_deref());
    line(&mut out, "Status", Some(&lead.status));
    line(&mut out, "Origin", lead.origin.as_deref());
    line(&mut out, "Notes", lead.notes.as_deref());
    let _ = writeln!(out, "- Created: {}", lead.created_at.format("%Y-%m-%d"));

    if let Some(segment) = segment {
        line(&mut out, "Segment", Some(&segment.name));
        line(&mut out, "Segment description", segment.description.as_deref());
        line(&mut out, "Segment audience", segment.audience.as_deref());
    }
    out
}

/// Which channels the site has configured, and which need lead contact data.
pub fn channels_context(channels: &SiteChannels) -> String {
    let enabled = channels.enabled();
    if enabled.is_empty() {
        return "No communication channels are configured for this site. \
                Prefer email if the lead has an address."
            .to_string();
    }

    let mut out = String::from("Configured channels (only use these):\n");
    for channel in enabled {
        let requirement = match channel {
            Channel::Email => "requires the lead's email",
            Channel::Whatsapp => "requires the lead's phone number",
            Channel::Notification => "in-app notification",
            Channel::Web => "website chat",
        };
        let _ = writeln!(out, "- {} ({})", channel, requirement);
    }
    out
}

/// Recent conversations with their latest messages, oldest message first.
pub fn conversation_history_context(history: &[ConversationHistory]) -> String {
    if history.iter().all(|h| h.messages.is_empty()) {
        return "No previous interactions with this lead.".to_string();
    }

    let mut out = String::new();
    for entry in history.iter().filter(|h| !h.messages.is_empty()) {
        let conversation = &entry.conversation;
        let _ = writeln!(
            out,
            "### {} ({}, {})",
            conversation.title.as_deref().unwrap_or("Conversation"),
            conversation.channel,
            conversation.created_at.format("%Y-%m-%d"),
        );

        let skip = entry
            .messages
            .len()
            .saturating_sub(HISTORY_MESSAGES_PER_CONVERSATION);
        for message in entry.messages.iter().skip(skip) {
            let _ = writeln!(
                out,
                "[{}] {}: {}",
                message.created_at.format("%Y-%m-%d %H:%M"),
                message.role.as_str(),
                message.content.trim()
            );
        }
        out.push('\n');
    }
    out
}

/// Attribution score of a team member.
pub fn attribution_score(stats: &TeamMemberStats) -> f64 {
    stats.conversions as f64 * 10.0 + stats.sales_total / 1000.0
}

/// Team members by descending attribution score. Ties keep input order.
pub fn rank_team(stats: &[TeamMemberStats]) -> Vec<(&TeamMemberStats, f64)> {
    let mut ranked: Vec<(&TeamMemberStats, f64)> =
        stats.iter().map(|s| (s, attribution_score(s))).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Team performance, best performers first.
pub fn team_attribution_context(stats: &[TeamMemberStats]) -> String {
    if stats.is_empty() {
        return String::new();
    }

    let mut out = String::from("Team members ranked by attribution score:\n");
    for (i, (member, score)) in rank_team(stats).into_iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} (user {}): score {:.1}, {} conversions, {:.2} in sales, {} active leads",
            i + 1,
            member.name,
            member.user_id,
            score,
            member.conversions,
            member.sales_total,
            member.active_leads,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use serde_json::json;
    use uncodie_core::{Conversation, Message, MessageRole};
    use uuid::Uuid;

    fn stats(name: &str, conversions: i64, sales_total: f64) -> TeamMemberStats {
        TeamMemberStats {
            user_id: Uuid::now_v7(),
            name: name.to_string(),
            conversions,
            sales_total,
            active_leads: 0,
        }
    }

    #[test]
    fn test_attribution_score() {
        assert_eq!(attribution_score(&stats("a", 3, 2_500.0)), 32.5);
    }

    #[test]
    fn test_team_context_orders_by_score() {
        let team = vec![
            stats("Low", 0, 500.0),
            stats("High", 2, 10_000.0),
            stats("Mid", 1, 0.0),
        ];
        let context = team_attribution_context(&team);
        let high = context.find("High").unwrap();
        let mid = context.find("Mid").unwrap();
        let low = context.find("Low").unwrap();
        assert!(high < mid && mid < low);
        assert!(context.starts_with("Team members ranked"));
    }

    #[test]
    fn test_channels_context() {
        let channels = SiteChannels::from_settings_json(&json!({ "whatsapp": { "enabled": true } }));
        let context = channels_context(&channels);
        assert!(context.contains("whatsapp (requires the lead's phone number)"));
        assert!(!context.contains("- email"));

        let none = channels_context(&SiteChannels::default());
        assert!(none.starts_with("No communication channels"));
    }

    #[test]
    fn test_history_keeps_latest_messages() {
        let conversation = Conversation {
            id: Uuid::now_v7(),
            site_id: Uuid::now_v7(),
            lead_id: Uuid::now_v7(),
            agent_id: None,
            channel: Channel::Email,
            title: Some("Intro".to_string()),
            status: "active".to_string(),
            created_at: Utc::now(),
        };
        let messages = (0..15)
            .map(|i| Message {
                id: Uuid::now_v7(),
                conversation_id: conversation.id,
                lead_id: None,
                role: MessageRole::Assistant,
                content: format!("msg-{:02}", i),
                custom_data: json!({}),
                created_at: Utc::now(),
            })
            .collect();

        let context = conversation_history_context(&[ConversationHistory {
            conversation,
            messages,
        }]);
        assert!(context.contains("### Intro (email"));
        assert!(!context.contains("msg-04"));
        assert!(context.contains("msg-05"));
        assert!(context.contains("msg-14"));
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(
            conversation_history_context(&[]),
            "No previous interactions with this lead."
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_rank_team_is_descending(
            raw in prop::collection::vec((0i64..1_000, 0.0f64..1_000_000.0), 0..20)
        ) {
            let team: Vec<TeamMemberStats> = raw
                .into_iter()
                .map(|(c, s)| stats("m", c, s))
                .collect();
            let ranked = rank_team(&team);
            prop_assert_eq!(ranked.len(), team.len());
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].1 >= pair[1].1);
            }
        }
    }
}
