//! Entity fixtures and a seeded store.

use chrono::Utc;
use serde_json::json;
use uncodie_core::{
    agent_roles, new_entity_id, Agent, EntityId, Lead, Profile, Site, SiteChannels, SiteSettings,
    TeamMember, TeamMemberStats,
};
use uncodie_storage::MockStore;

pub fn site(owner_id: EntityId) -> Site {
    Site {
        id: new_entity_id(),
        name: "Acme Robotics".to_string(),
        url: Some("https://acme.test".to_string()),
        user_id: owner_id,
        description: Some("Industrial automation for small factories".to_string()),
    }
}

pub fn lead(site_id: EntityId) -> Lead {
    let now = Utc::now();
    Lead {
        id: new_entity_id(),
        site_id,
        name: "Ana Torres".to_string(),
        email: Some("ana@globex.test".to_string()),
        phone: None,
        company: Some("Globex".to_string()),
        position: Some("Operations Manager".to_string()),
        status: "new".to_string(),
        assignee_id: None,
        segment_id: None,
        origin: Some("website".to_string()),
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn profile(name: &str, email: &str) -> Profile {
    Profile {
        id: new_entity_id(),
        name: Some(name.to_string()),
        email: Some(email.to_string()),
    }
}

pub fn agent(site_id: EntityId, owner_id: EntityId, role: &str) -> Agent {
    Agent {
        id: new_entity_id(),
        site_id,
        user_id: owner_id,
        name: format!("{} agent", role),
        role: role.to_string(),
        status: "active".to_string(),
        created_at: Utc::now(),
    }
}

pub fn settings(site_id: EntityId, channels: serde_json::Value) -> SiteSettings {
    SiteSettings {
        site_id,
        channels: SiteChannels::from_settings_json(&channels),
        company_size: Some("11-50".to_string()),
        industry: Some("Manufacturing".to_string()),
        icp: Some("Operations leaders at mid-size factories".to_string()),
    }
}

fn member(profile: &Profile, role: &str) -> TeamMember {
    TeamMember {
        user_id: profile.id,
        name: profile.name.clone(),
        email: profile.email.clone(),
        role: role.to_string(),
    }
}

/// A site with an owner, one more team member, an email-enabled channel
/// configuration, a lead with an email address and an active sales agent.
#[derive(Debug, Clone)]
pub struct SalesWorld {
    pub store: MockStore,
    pub site: Site,
    pub owner: Profile,
    pub member: Profile,
    pub lead: Lead,
    pub sales_agent: Agent,
}

impl SalesWorld {
    pub fn seed() -> Self {
        let store = MockStore::new();

        let owner = profile("Olivia Owner", "olivia@acme.test");
        let member_profile = profile("Marco Member", "marco@acme.test");
        let site = site(owner.id);
        let lead = lead(site.id);
        let sales_agent = agent(site.id, owner.id, agent_roles::SALES);

        store.insert_profile(owner.clone());
        store.insert_profile(member_profile.clone());
        store.insert_site(site.clone());
        store.insert_settings(settings(
            site.id,
            json!({ "email": { "enabled": true }, "whatsapp": { "enabled": false } }),
        ));
        store.add_team_member(site.id, member(&owner, "owner"));
        store.add_team_member(site.id, member(&member_profile, "marketing"));
        store.set_team_stats(
            site.id,
            vec![
                TeamMemberStats {
                    user_id: owner.id,
                    name: "Olivia Owner".to_string(),
                    conversions: 4,
                    sales_total: 12_000.0,
                    active_leads: 3,
                },
                TeamMemberStats {
                    user_id: member_profile.id,
                    name: "Marco Member".to_string(),
                    conversions: 1,
                    sales_total: 900.0,
                    active_leads: 5,
                },
            ],
        );
        store.insert_lead(lead.clone());
        store.insert_agent(sales_agent.clone());

        Self {
            store,
            site,
            owner,
            member: member_profile,
            lead,
            sales_agent,
        }
    }

    /// Add an active copywriter agent.
    pub fn with_copywriter(self) -> Self {
        self.store
            .insert_agent(agent(self.site.id, self.owner.id, agent_roles::COPYWRITER));
        self
    }

    /// Replace the site's channel configuration.
    pub fn with_channels(self, channels: serde_json::Value) -> Self {
        self.store.insert_settings(settings(self.site.id, channels));
        self
    }

    /// Replace the seeded lead.
    pub fn with_lead(mut self, edit: impl FnOnce(&mut Lead)) -> Self {
        edit(&mut self.lead);
        self.store.insert_lead(self.lead.clone());
        self
    }
}
