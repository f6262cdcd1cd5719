//! Proptest generators.

use proptest::prelude::*;
use uncodie_core::{Channel, TeamMemberStats};
use uuid::Uuid;

pub fn arb_channel() -> impl Strategy<Value = Channel> {
    prop_oneof![
        Just(Channel::Email),
        Just(Channel::Whatsapp),
        Just(Channel::Notification),
        Just(Channel::Web),
    ]
}

/// Optional contact value, sometimes blank.
pub fn arb_contact() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("   ".to_string())),
        "[a-z]{1,8}@[a-z]{1,8}\\.test".prop_map(Some),
    ]
}

pub fn arb_team_stats() -> impl Strategy<Value = TeamMemberStats> {
    ("[A-Z][a-z]{2,10}", 0i64..500, 0.0f64..500_000.0, 0i64..50).prop_map(
        |(name, conversions, sales_total, active_leads)| TeamMemberStats {
            user_id: Uuid::now_v7(),
            name,
            conversions,
            sales_total,
            active_leads,
        },
    )
}
