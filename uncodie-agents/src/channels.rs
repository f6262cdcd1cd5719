//! Channel correction for drafted messages.
//!
//! Agents sometimes pick a channel the site has not configured or the lead
//! cannot be reached on. Before a draft is refined or stored, its channel is
//! checked and, when needed, retargeted to the first usable fallback.

use serde::Serialize;
use uncodie_commands::FollowUpContent;
use uncodie_core::{Channel, Lead, SiteChannels};

/// Fallback order when the requested channel is unusable.
pub const FALLBACK_CHANNELS: [Channel; 2] = [Channel::Email, Channel::Whatsapp];

/// Record of a retargeted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChannelCorrection {
    pub original: Channel,
    pub corrected: Channel,
    pub reason: String,
}

/// Outcome of [`filter_and_correct_message_channel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelDecision {
    /// Send the content, possibly on a different channel than requested.
    Send {
        content: FollowUpContent,
        correction: Option<ChannelCorrection>,
    },
    /// No channel can reach the lead.
    Dropped { reason: String },
}

/// Why `channel` cannot be used for `lead`, or `None` when it can.
pub fn unusable_reason(channel: Channel, lead: &Lead, channels: &SiteChannels) -> Option<String> {
    if !channels.is_enabled(channel) {
        return Some(format!("{} is not configured for this site", channel));
    }
    match channel {
        Channel::Email if lead.contact_email().is_none() => {
            Some("lead has no email address".to_string())
        }
        Channel::Whatsapp if lead.contact_phone().is_none() => {
            Some("lead has no phone number".to_string())
        }
        _ => None,
    }
}

pub fn is_channel_usable(channel: Channel, lead: &Lead, channels: &SiteChannels) -> bool {
    unusable_reason(channel, lead, channels).is_none()
}

/// Keep, retarget or drop a drafted message based on site configuration
/// and the lead's contact data.
pub fn filter_and_correct_message_channel(
    mut content: FollowUpContent,
    lead: &Lead,
    channels: &SiteChannels,
) -> ChannelDecision {
    let requested = content.channel;
    let Some(problem) = unusable_reason(requested, lead, channels) else {
        return ChannelDecision::Send {
            content,
            correction: None,
        };
    };

    let fallback = FALLBACK_CHANNELS
        .into_iter()
        .filter(|c| *c != requested)
        .find(|c| is_channel_usable(*c, lead, channels));

    match fallback {
        Some(corrected) => {
            content.channel = corrected;
            ChannelDecision::Send {
                content,
                correction: Some(ChannelCorrection {
                    original: requested,
                    corrected,
                    reason: format!("{}; retargeted to {}", problem, corrected),
                }),
            }
        }
        None => ChannelDecision::Dropped {
            reason: format!("{} and no fallback channel can reach the lead", problem),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use uncodie_test_utils::generators::{arb_channel, arb_contact};
    use uncodie_test_utils::lead as lead_fixture;

    fn draft(channel: Channel) -> FollowUpContent {
        FollowUpContent {
            channel,
            subject: Some("Next steps".to_string()),
            message: "Hi Ana".to_string(),
            strategy: None,
        }
    }

    fn lead(email: Option<&str>, phone: Option<&str>) -> Lead {
        let mut lead = lead_fixture(uncodie_core::new_entity_id());
        lead.email = email.map(String::from);
        lead.phone = phone.map(String::from);
        lead
    }

    fn all_channels() -> SiteChannels {
        SiteChannels::from_settings_json(&json!({
            "email": {}, "whatsapp": {}, "notification": {}, "web": {}
        }))
    }

    #[test]
    fn test_usable_channel_is_kept() {
        let decision = filter_and_correct_message_channel(
            draft(Channel::Whatsapp),
            &lead(None, Some("+34600000000")),
            &all_channels(),
        );
        assert!(matches!(
            decision,
            ChannelDecision::Send { ref content, correction: None } if content.channel == Channel::Whatsapp
        ));
    }

    #[test]
    fn test_whatsapp_without_phone_retargets_to_email() {
        let decision = filter_and_correct_message_channel(
            draft(Channel::Whatsapp),
            &lead(Some("ana@globex.test"), None),
            &all_channels(),
        );
        let ChannelDecision::Send { content, correction } = decision else {
            panic!("expected Send");
        };
        assert_eq!(content.channel, Channel::Email);
        assert_eq!(content.message, "Hi Ana");
        let correction = correction.unwrap();
        assert_eq!(correction.original, Channel::Whatsapp);
        assert_eq!(correction.corrected, Channel::Email);
        assert!(correction.reason.contains("no phone number"));
    }

    #[test]
    fn test_unconfigured_channel_retargets() {
        let channels = SiteChannels::from_settings_json(&json!({ "whatsapp": {} }));
        let decision = filter_and_correct_message_channel(
            draft(Channel::Email),
            &lead(Some("ana@globex.test"), Some("+34600000000")),
            &channels,
        );
        let ChannelDecision::Send { content, correction } = decision else {
            panic!("expected Send");
        };
        assert_eq!(content.channel, Channel::Whatsapp);
        assert!(correction.unwrap().reason.contains("not configured"));
    }

    #[test]
    fn test_no_fallback_is_dropped() {
        let channels = SiteChannels::from_settings_json(&json!({ "email": {}, "whatsapp": {} }));
        let decision = filter_and_correct_message_channel(
            draft(Channel::Whatsapp),
            &lead(Some("  "), None),
            &channels,
        );
        assert!(matches!(decision, ChannelDecision::Dropped { ref reason } if reason.contains("no fallback")));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_sent_channel_is_always_usable(
            requested in arb_channel(),
            email in arb_contact(),
            phone in arb_contact(),
            enabled in prop::collection::vec(any::<bool>(), 4),
        ) {
            let mut lead = lead(None, None);
            lead.email = email;
            lead.phone = phone;
            let channels = SiteChannels::from_settings_json(&json!({
                "email": { "enabled": enabled[0] },
                "whatsapp": { "enabled": enabled[1] },
                "notification": { "enabled": enabled[2] },
                "web": { "enabled": enabled[3] },
            }));

            match filter_and_correct_message_channel(draft(requested), &lead, &channels) {
                ChannelDecision::Send { content, correction } => {
                    prop_assert!(is_channel_usable(content.channel, &lead, &channels));
                    prop_assert_eq!(correction.is_some(), content.channel != requested);
                }
                ChannelDecision::Dropped { .. } => {
                    prop_assert!(!is_channel_usable(requested, &lead, &channels));
                    for c in FALLBACK_CHANNELS {
                        prop_assert!(!is_channel_usable(c, &lead, &channels));
                    }
                }
            }
        }
    }
}
