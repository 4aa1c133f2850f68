//! Notifications about subscription budget changes.
//!
//! Repositories report events through the [`Notifier`] trait. Delivery is
//! best-effort: failures are logged and recorded, never returned.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use uuid::Uuid;

use budgetguard_core::reconcile::{
    BillingStatus, OverBudgetWarning, SnapshotNotice, UsageAlert,
};
use budgetguard_core::summary::RoleAssignment;
use budgetguard_shared::EmailService;
use budgetguard_shared::config::AccountingConfig;

use crate::entities::{emails, failed_emails, subscription_details};

/// Prefix for notices rerouted to administrators.
pub const UNDELIVERABLE_PREFIX: &str = "Undeliverable: ";

/// Audit type of expiry warnings.
pub const EMAIL_TYPE_TIMEBASED: &str = "time-based";
/// Audit type of over-budget warnings.
pub const EMAIL_TYPE_OVERBUDGET: &str = "overbudget";
/// Audit type of usage threshold alerts.
pub const EMAIL_TYPE_USAGE_ALERT: &str = "usage-alert";
/// Audit type of the first notice about a subscription.
pub const EMAIL_TYPE_WELCOME: &str = "subscription welcome";

/// Audit types that count as a budget warning when rate limiting.
pub const WARNING_EMAIL_TYPES: [&str; 3] =
    [EMAIL_TYPE_OVERBUDGET, EMAIL_TYPE_TIMEBASED, EMAIL_TYPE_USAGE_ALERT];

// ============================================================================
// Notification payloads
// ============================================================================

/// A notice addressed to a subscription's users.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Subscription the notice is about.
    pub subscription_id: Uuid,
    /// Which notice this is.
    pub template: &'static str,
    /// Subject line, followed by the subscription's name.
    pub subject_prefix: String,
    /// Type recorded in the audit table.
    pub email_type: &'static str,
    /// Event details.
    pub extra: Value,
}

impl Notification {
    /// The subscription is about to be turned off.
    #[must_use]
    pub fn will_be_disabled(subscription_id: Uuid, reason: BillingStatus) -> Self {
        Self {
            subscription_id,
            template: "will_be_disabled",
            subject_prefix: "We will turn off your subscription:".to_string(),
            email_type: "subscription disabled",
            extra: json!({ "reason": reason }),
        }
    }

    /// The subscription is about to be turned back on.
    #[must_use]
    pub fn will_be_enabled(subscription_id: Uuid) -> Self {
        Self {
            subscription_id,
            template: "will_be_enabled",
            subject_prefix: "We will turn on your subscription:".to_string(),
            email_type: "subscription enabled",
            extra: Value::Null,
        }
    }

    /// A new approval was recorded.
    #[must_use]
    pub fn new_approval(subscription_id: Uuid, extra: Value) -> Self {
        Self {
            subscription_id,
            template: "new_approval",
            subject_prefix: "New approval for your subscription:".to_string(),
            email_type: "subscription approval",
            extra,
        }
    }

    /// A new allocation was recorded.
    #[must_use]
    pub fn new_allocation(subscription_id: Uuid, extra: Value) -> Self {
        Self {
            subscription_id,
            template: "new_allocation",
            subject_prefix: "New allocation for your subscription:".to_string(),
            email_type: "subscription allocation",
            extra,
        }
    }

    /// The approval window closes in `days` days, or closed `-days` ago.
    #[must_use]
    pub fn expiry_looming(subscription_id: Uuid, days: i64) -> Self {
        Self {
            subscription_id,
            template: "expiry_looming",
            subject_prefix: format!("{days} days until the expiry of your subscription:"),
            email_type: EMAIL_TYPE_TIMEBASED,
            extra: json!({ "days": days }),
        }
    }

    /// Spend has gone beyond the allocation.
    #[must_use]
    pub fn over_budget(warning: OverBudgetWarning) -> Self {
        let share = warning
            .percentage_used
            .map_or_else(|| "All".to_string(), |p| format!("{p}%"));
        Self {
            subscription_id: warning.subscription_id,
            template: "over_budget",
            subject_prefix: format!("{share} of allocated budget used by your subscription:"),
            email_type: EMAIL_TYPE_OVERBUDGET,
            extra: json!({ "percentage_used": warning.percentage_used }),
        }
    }

    /// Spend has crossed a share of the allocation.
    #[must_use]
    pub fn usage_alert(alert: UsageAlert) -> Self {
        Self {
            subscription_id: alert.subscription_id,
            template: "usage_alert",
            subject_prefix: format!(
                "{}% of allocated budget used by your subscription:",
                alert.percentage
            ),
            email_type: EMAIL_TYPE_USAGE_ALERT,
            extra: json!({ "percentage_used": alert.percentage }),
        }
    }

    /// Notice owed after a new snapshot.
    #[must_use]
    pub fn snapshot(subscription_id: Uuid, notice: &SnapshotNotice) -> Self {
        match notice {
            SnapshotNotice::Welcome => Self {
                subscription_id,
                template: "welcome",
                subject_prefix: "You have a new subscription:".to_string(),
                email_type: EMAIL_TYPE_WELCOME,
                extra: Value::Null,
            },
            SnapshotNotice::StatusChange {
                old_name,
                new_name,
                old_state,
                new_state,
            } => Self {
                subscription_id,
                template: "status_change",
                subject_prefix: "There has been a status change for your subscription:"
                    .to_string(),
                email_type: "subscription status",
                extra: json!({
                    "old_status": { "display_name": old_name, "state": old_state },
                    "new_status": { "display_name": new_name, "state": new_state },
                }),
            },
            SnapshotNotice::RolesChange { added, removed } => Self {
                subscription_id,
                template: "role_assignment_change",
                subject_prefix: "The user roles have changed for your subscription:".to_string(),
                email_type: "subscription roles",
                extra: json!({
                    "added_to_rbac": added,
                    "removed_from_rbac": removed,
                }),
            },
        }
    }

    fn headline(&self) -> &'static str {
        match self.template {
            "will_be_disabled" => "This subscription will be disabled.",
            "will_be_enabled" => "This subscription will be enabled.",
            "new_approval" => "A new approval has been recorded for this subscription.",
            "new_allocation" => "A new allocation has been recorded for this subscription.",
            "expiry_looming" => "The approval for this subscription is about to expire.",
            "over_budget" => "This subscription has spent more than its allocated budget.",
            "usage_alert" => "This subscription is using up its allocated budget.",
            "welcome" => "A new subscription has been registered for you.",
            "status_change" => "The status of this subscription has changed.",
            "role_assignment_change" => "The users of this subscription have changed.",
            _ => "There is an update for this subscription.",
        }
    }

    /// Plain-text body.
    #[must_use]
    pub fn body(&self, name: &str) -> String {
        let mut body = format!(
            "Subscription: {name}\nSubscription ID: {}\n\n{}\n",
            self.subscription_id,
            self.headline()
        );
        if !self.extra.is_null() {
            let details =
                serde_json::to_string_pretty(&self.extra).unwrap_or_else(|_| self.extra.to_string());
            body.push_str("\nDetails:\n");
            body.push_str(&details);
            body.push('\n');
        }
        body
    }
}

/// A notice addressed to the administrators.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminNotification {
    /// Subject line.
    pub subject: String,
    /// Type recorded in the audit table.
    pub email_type: &'static str,
    /// Plain-text body.
    pub body: String,
    /// Event details for the audit table.
    pub extra: Value,
}

// ============================================================================
// Notifier
// ============================================================================

/// Delivers notices. Implementations log failures instead of returning them.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifies the users of one subscription.
    async fn notify(&self, notification: Notification);

    /// Notifies the administrators.
    async fn notify_admins(&self, notification: AdminNotification);
}

/// Discards every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, notification: Notification) {
        info!(
            subscription_id = %notification.subscription_id,
            email_type = notification.email_type,
            "Notification discarded"
        );
    }

    async fn notify_admins(&self, notification: AdminNotification) {
        info!(subject = %notification.subject, "Admin notification discarded");
    }
}

/// Selects the addresses of users holding a notifiable role on the subscription.
#[must_use]
pub fn role_recipients(assignments: &Value, subscription_id: Uuid, roles: &[String]) -> Vec<String> {
    let Ok(assignments) = serde_json::from_value::<Vec<RoleAssignment>>(assignments.clone()) else {
        return Vec::new();
    };
    let id = subscription_id.to_string();

    let unique: BTreeSet<String> = assignments
        .into_iter()
        .filter(|a| roles.contains(&a.role_name))
        .filter(|a| a.scope.as_deref().is_some_and(|scope| scope.contains(&id)))
        .filter_map(|a| a.mail.filter(|m| !m.is_empty()))
        .collect();
    unique.into_iter().collect()
}

/// Sends notices over SMTP and records them in `emails` / `failed_emails`.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    db: DatabaseConnection,
    mailer: EmailService,
    notifiable_roles: Vec<String>,
    admin_recipients: Vec<String>,
}

impl EmailNotifier {
    /// Creates a notifier.
    #[must_use]
    pub fn new(db: DatabaseConnection, mailer: EmailService, accounting: &AccountingConfig) -> Self {
        Self {
            db,
            mailer,
            notifiable_roles: accounting.notifiable_roles.clone(),
            admin_recipients: accounting.admin_email_recipients.clone(),
        }
    }

    async fn latest_details(&self, subscription_id: Uuid) -> Option<subscription_details::Model> {
        match subscription_details::Entity::find()
            .filter(subscription_details::Column::SubscriptionId.eq(subscription_id))
            .order_by_desc(subscription_details::Column::Id)
            .one(&self.db)
            .await
        {
            Ok(details) => details,
            Err(e) => {
                error!(subscription_id = %subscription_id, error = %e, "Failed to look up recipients");
                None
            }
        }
    }

    async fn deliver(
        &self,
        subscription_id: Option<Uuid>,
        email_type: &str,
        recipients: &[String],
        subject: &str,
        body: &str,
        extra: &Value,
    ) {
        let outcome = if self.mailer.config().enabled {
            self.mailer
                .send_email(recipients, subject, body)
                .await
                .map_err(|e| e.to_string())
        } else {
            Err("email delivery is disabled".to_string())
        };

        let joined = recipients.join(";");
        match outcome {
            Ok(()) => {
                info!(email_type, recipients = %joined, subject, "Sent email");
                let row = emails::ActiveModel {
                    subscription_id: Set(subscription_id),
                    email_type: Set(email_type.to_string()),
                    recipients: Set(joined),
                    extra_info: Set((!extra.is_null()).then(|| extra.clone())),
                    ..Default::default()
                };
                if let Err(e) = row.insert(&self.db).await {
                    error!(error = %e, "Failed to record sent email");
                }
            }
            Err(reason) => {
                let row = failed_emails::ActiveModel {
                    subscription_id: Set(subscription_id),
                    email_type: Set(email_type.to_string()),
                    subject: Set(subject.to_string()),
                    recipients: Set(joined),
                    message: Set(body.to_string()),
                    ..Default::default()
                };
                match row.insert(&self.db).await {
                    Ok(saved) => error!(
                        email_type,
                        subject,
                        reason = %reason,
                        failed_email_id = saved.id,
                        "Email not sent, recorded in failed_emails"
                    ),
                    Err(e) => error!(
                        email_type,
                        subject,
                        reason = %reason,
                        error = %e,
                        "Email not sent and could not be recorded"
                    ),
                }
            }
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, notification: Notification) {
        let details = self.latest_details(notification.subscription_id).await;
        let name = details
            .as_ref()
            .and_then(|d| d.display_name.clone())
            .unwrap_or_else(|| notification.subscription_id.to_string());
        let recipients = details
            .as_ref()
            .map(|d| {
                role_recipients(
                    &d.role_assignments,
                    notification.subscription_id,
                    &self.notifiable_roles,
                )
            })
            .unwrap_or_default();

        let mut subject = format!("{} {name}", notification.subject_prefix);
        let recipients = if recipients.is_empty() {
            subject.insert_str(0, UNDELIVERABLE_PREFIX);
            self.admin_recipients.clone()
        } else {
            recipients
        };

        if recipients.is_empty() {
            warn!(
                subscription_id = %notification.subscription_id,
                email_type = notification.email_type,
                "Nobody to send email to"
            );
            return;
        }

        let body = notification.body(&name);
        self.deliver(
            Some(notification.subscription_id),
            notification.email_type,
            &recipients,
            &subject,
            &body,
            &notification.extra,
        )
        .await;
    }

    async fn notify_admins(&self, notification: AdminNotification) {
        if self.admin_recipients.is_empty() {
            warn!(subject = %notification.subject, "Nobody to send admin email to");
            return;
        }

        self.deliver(
            None,
            notification.email_type,
            &self.admin_recipients,
            &notification.subject,
            &notification.body,
            &notification.extra,
        )
        .await;
    }
}
