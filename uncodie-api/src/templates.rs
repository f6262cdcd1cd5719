//! Email templates.
//!
//! Templates are embedded at compile time and rendered with HTML
//! auto-escaping; every page extends `base.html`, which carries branding.

use minijinja::{AutoEscape, Environment, Error};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::config::Branding;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("lead_assignment.html", include_str!("../templates/lead_assignment.html")),
    ("campaigns_digest.html", include_str!("../templates/campaigns_digest.html")),
    ("content_digest.html", include_str!("../templates/content_digest.html")),
    ("quota_error.html", include_str!("../templates/quota_error.html")),
];

static ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|name| {
        if name.ends_with(".html") {
            AutoEscape::Html
        } else {
            AutoEscape::None
        }
    });
    for &(name, source) in TEMPLATES {
        if let Err(e) = env.add_template(name, source) {
            tracing::error!(template = name, error = %e, "Failed to load email template");
        }
    }
    env
});

pub fn render_template<T: Serialize>(name: &str, ctx: T) -> Result<String, Error> {
    let tpl = ENV.get_template(name)?;
    tpl.render(ctx)
}

// ============================================================================
// TEMPLATE CONTEXTS
// ============================================================================

/// Lead fields shown in assignment emails.
#[derive(Debug, Clone, Serialize)]
pub struct LeadSummary {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub status: String,
}

impl From<&uncodie_core::Lead> for LeadSummary {
    fn from(lead: &uncodie_core::Lead) -> Self {
        Self {
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            company: lead.company.clone(),
            position: lead.position.clone(),
            status: lead.status.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadAssignmentEmail<'a> {
    pub brand: &'a Branding,
    /// Team copy instead of the assignee's own.
    pub for_team: bool,
    pub lead: LeadSummary,
    pub assignee_name: String,
    pub site_name: String,
    pub brief: String,
    pub next_steps: Vec<String>,
    pub priority: String,
    pub due_date: Option<String>,
    pub additional_context: Option<String>,
    pub lead_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestItem {
    pub title: String,
    pub description: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestEmail<'a> {
    pub brand: &'a Branding,
    pub site_name: String,
    pub items: Vec<DigestItem>,
    pub review_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaErrorEmail<'a> {
    pub brand: &'a Branding,
    pub site_name: String,
    pub error_message: String,
    pub provider: Option<String>,
    pub quota_type: Option<String>,
    pub command_id: Option<String>,
    pub billing_url: String,
}

pub fn lead_assignment(ctx: &LeadAssignmentEmail<'_>) -> Result<String, Error> {
    render_template("lead_assignment.html", ctx)
}

pub fn campaigns_digest(ctx: &DigestEmail<'_>) -> Result<String, Error> {
    render_template("campaigns_digest.html", ctx)
}

pub fn content_digest(ctx: &DigestEmail<'_>) -> Result<String, Error> {
    render_template("content_digest.html", ctx)
}

pub fn quota_error(ctx: &QuotaErrorEmail<'_>) -> Result<String, Error> {
    render_template("quota_error.html", ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(brand: &Branding) -> LeadAssignmentEmail<'_> {
        LeadAssignmentEmail {
            brand,
            for_team: false,
            lead: LeadSummary {
                name: "Ana <Torres>".to_string(),
                email: Some("ana@globex.test".to_string()),
                phone: None,
                company: Some("Globex".to_string()),
                position: None,
                status: "new".to_string(),
            },
            assignee_name: "Marco".to_string(),
            site_name: "Acme".to_string(),
            brief: "Warm lead from the webinar".to_string(),
            next_steps: vec!["Call".to_string(), "Send deck".to_string()],
            priority: "high".to_string(),
            due_date: None,
            additional_context: None,
            lead_url: "http://localhost:3000/leads/1".to_string(),
        }
    }

    #[test]
    fn test_lead_assignment_escapes_and_lists_steps() {
        let brand = Branding::default();
        let html = lead_assignment(&assignment(&brand)).unwrap();
        assert!(html.contains("Ana &lt;Torres&gt;"));
        assert!(!html.contains("Ana <Torres>"));
        assert!(html.contains("<li>Send deck</li>"));
        assert!(html.contains("Hi Marco"));
        assert!(html.contains(&brand.branding_text));
    }

    #[test]
    fn test_team_copy_has_different_heading() {
        let brand = Branding::default();
        let mut ctx = assignment(&brand);
        ctx.for_team = true;
        let html = lead_assignment(&ctx).unwrap();
        assert!(html.contains("was assigned to Marco"));
    }

    #[test]
    fn test_digest_pluralizes() {
        let brand = Branding {
            logo_url: Some("https://cdn.acme.test/logo.png".to_string()),
            ..Default::default()
        };
        let one = DigestEmail {
            brand: &brand,
            site_name: "Acme".to_string(),
            items: vec![DigestItem {
                title: "Spring launch".to_string(),
                description: None,
                content_type: None,
            }],
            review_url: "http://localhost:3000/campaigns".to_string(),
        };
        let html = campaigns_digest(&one).unwrap();
        assert!(html.contains("1 campaign ready"));
        assert!(html.contains("<img"));
        assert!(html.contains("Spring launch"));
    }

    #[test]
    fn test_quota_error_renders_message() {
        let brand = Branding::default();
        let html = quota_error(&QuotaErrorEmail {
            brand: &brand,
            site_name: "Acme".to_string(),
            error_message: "Monthly token quota exceeded".to_string(),
            provider: Some("openai".to_string()),
            quota_type: None,
            command_id: None,
            billing_url: "http://localhost:3000/billing".to_string(),
        })
        .unwrap();
        assert!(html.contains("Monthly token quota exceeded"));
        assert!(html.contains("openai"));
    }
}
