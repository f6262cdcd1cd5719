//! Team notifications: one in-app notification row and one email per
//! team member.

use std::sync::Arc;

use serde::Serialize;
use uncodie_core::{EntityId, NewNotification};
use uncodie_storage::SalesStore;

use crate::email::{EmailClient, EmailMessage};

/// What to tell the team.
#[derive(Debug, Clone)]
pub struct TeamNotification {
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<EntityId>,
    pub email_subject: String,
    pub email_html: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct TeamNotifyReport {
    pub notifications_created: usize,
    pub emails_sent: usize,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct TeamNotifier {
    store: Arc<dyn SalesStore>,
    email: Arc<dyn EmailClient>,
}

impl std::fmt::Debug for TeamNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamNotifier").finish_non_exhaustive()
    }
}

impl TeamNotifier {
    pub fn new(store: Arc<dyn SalesStore>, email: Arc<dyn EmailClient>) -> Self {
        Self { store, email }
    }

    /// Notify every team member of `site_id` not listed in `exclude`.
    ///
    /// Never fails: a team that cannot be loaded and per-member failures
    /// all end up in the report's `errors`.
    #[tracing::instrument(skip(self, notification, exclude), fields(kind = %notification.notification_type))]
    pub async fn notify(
        &self,
        site_id: EntityId,
        notification: &TeamNotification,
        exclude: &[EntityId],
    ) -> TeamNotifyReport {
        let mut report = TeamNotifyReport::default();

        let members = match self.store.team_members(site_id).await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(%site_id, error = %e, "Could not load team");
                report.errors.push(format!("Failed to load team members: {}", e));
                return report;
            }
        };

        for member in members.iter().filter(|m| !exclude.contains(&m.user_id)) {
            let row = NewNotification {
                site_id,
                user_id: member.user_id,
                title: notification.title.clone(),
                message: notification.message.clone(),
                notification_type: notification.notification_type.clone(),
                related_entity_type: notification.related_entity_type.clone(),
                related_entity_id: notification.related_entity_id,
            };
            match self.store.notification_insert(&row).await {
                Ok(_) => report.notifications_created += 1,
                Err(e) => report.errors.push(format!(
                    "Failed to create notification for {}: {}",
                    member.user_id, e
                )),
            }

            let Some(address) = member.email.as_deref().filter(|a| !a.trim().is_empty()) else {
                continue;
            };
            let categories: Vec<&str> = notification.categories.iter().map(String::as_str).collect();
            let mut message = EmailMessage::new(
                address,
                notification.email_subject.clone(),
                notification.email_html.clone(),
            )
            .with_categories(&categories)
            .with_arg("site_id", site_id)
            .with_arg("notification_type", &notification.notification_type);
            if let Some(id) = notification.related_entity_id {
                message = message.with_arg("related_entity_id", id);
            }
            match self.email.send(&message).await {
                Ok(_) => report.emails_sent += 1,
                Err(e) => report
                    .errors
                    .push(format!("Failed to email {}: {}", address, e)),
            }
        }

        tracing::info!(
            %site_id,
            notifications = report.notifications_created,
            emails = report.emails_sent,
            errors = report.errors.len(),
            "Team notified"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MockEmailClient;
    use uncodie_test_utils::SalesWorld;

    fn notification() -> TeamNotification {
        TeamNotification {
            title: "New campaigns".to_string(),
            message: "2 campaigns need review".to_string(),
            notification_type: "new_campaigns".to_string(),
            related_entity_type: None,
            related_entity_id: None,
            email_subject: "Campaigns ready".to_string(),
            email_html: "<p>hi</p>".to_string(),
            categories: vec!["campaigns".to_string()],
        }
    }

    #[tokio::test]
    async fn test_notifies_everyone_but_excluded() {
        let world = SalesWorld::seed();
        let email = Arc::new(MockEmailClient::new());
        let notifier = TeamNotifier::new(Arc::new(world.store.clone()), email.clone());

        let report = notifier
            .notify(world.site.id, &notification(), &[world.owner.id])
            .await;

        assert_eq!(report.notifications_created, 1);
        assert_eq!(report.emails_sent, 1);
        assert!(report.errors.is_empty());
        assert_eq!(email.sent()[0].to, "marco@acme.test");
    }

    #[tokio::test]
    async fn test_email_failures_are_collected() {
        let world = SalesWorld::seed();
        let email = Arc::new(MockEmailClient::new());
        email.fail_for("marco@acme.test");
        let notifier = TeamNotifier::new(Arc::new(world.store.clone()), email.clone());

        let report = notifier.notify(world.site.id, &notification(), &[]).await;

        assert_eq!(report.notifications_created, 2);
        assert_eq!(report.emails_sent, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("marco@acme.test"));
    }

    #[tokio::test]
    async fn test_team_load_failure_is_reported() {
        let world = SalesWorld::seed();
        world.store.fail_table("site_members");
        let notifier = TeamNotifier::new(
            Arc::new(world.store.clone()),
            Arc::new(MockEmailClient::new()),
        );

        let report = notifier.notify(world.site.id, &notification(), &[]).await;
        assert_eq!(report.notifications_created, 0);
        assert_eq!(report.emails_sent, 0);
        assert_eq!(report.errors.len(), 1);
    }
}
