//! BudgetGuard daily worker.
//!
//! Once a day at `worker.daily_run_time` (UTC) abolishes long-disabled
//! subscriptions, reconciles every desired state, then sends the expiry
//! and over-budget warnings that are due.
//!
//! Usage:
//!   budgetguard-worker          - Run forever
//!   budgetguard-worker --once   - Run one pass and exit

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use budgetguard_core::summary::SubscriptionFilter;
use budgetguard_db::{
    AbolishmentRepository, BudgetMonitor, DesiredStateRepository, EmailNotifier, Notifier,
    connect_with,
};
use budgetguard_shared::{AppConfig, EmailService};

/// Time left until the next `at` strictly after `now`.
fn until_next_run(now: DateTime<Utc>, at: NaiveTime) -> std::time::Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today + Duration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}

struct DailyRoutine {
    abolishment: AbolishmentRepository,
    desired: DesiredStateRepository,
    monitor: BudgetMonitor,
    admin: uuid::Uuid,
}

impl DailyRoutine {
    async fn run(&self) -> anyhow::Result<()> {
        let abolished = self
            .abolishment
            .abolish(self.admin)
            .await
            .context("abolishment failed")?;
        let report = self
            .desired
            .reconcile_desired_states(self.admin, None)
            .await
            .context("reconciliation failed")?;
        let warnings = self
            .monitor
            .check_budgets(&SubscriptionFilter::All)
            .await
            .context("budget check failed")?;

        info!(
            abolished = abolished.len(),
            adjusted = report.adjusted.len(),
            disabled = report.disabled.len(),
            enabled = report.enabled.len(),
            expiring = warnings.expiring.len(),
            over_budget = warnings.over_budget.len(),
            "Daily routine finished"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "budgetguard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let once = std::env::args().skip(1).any(|arg| arg == "--once");

    let config = AppConfig::load().context("failed to load configuration")?;
    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let mailer = EmailService::new(config.email.clone());
    info!(
        enabled = config.email.enabled,
        smtp_host = %config.email.smtp_host,
        "Email service configured"
    );
    let notifier: Arc<dyn Notifier> =
        Arc::new(EmailNotifier::new(db.clone(), mailer, &config.accounting));

    let routine = DailyRoutine {
        abolishment: AbolishmentRepository::new(
            db.clone(),
            Arc::clone(&notifier),
            config.accounting.abolishment_inactive_days,
        ),
        desired: DesiredStateRepository::new(db.clone(), Arc::clone(&notifier)),
        monitor: BudgetMonitor::new(db, notifier),
        admin: config.accounting.system_admin,
    };

    if once {
        return routine.run().await;
    }

    loop {
        let wait = until_next_run(Utc::now(), config.worker.daily_run_time);
        info!(wait_secs = wait.as_secs(), "Waiting for next daily run");
        tokio::time::sleep(wait).await;

        if let Err(e) = routine.run().await {
            error!(error = %format!("{e:#}"), "Daily routine failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let at = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        assert_eq!(until_next_run(now, at).as_secs(), 6 * 3600);
    }

    #[test]
    fn test_next_run_tomorrow_when_passed() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 16, 0, 0).unwrap();
        let at = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        assert_eq!(until_next_run(now, at).as_secs(), 24 * 3600);
    }
}
