//! Application configuration management.

use chrono::NaiveTime;
use serde::Deserialize;
use uuid::Uuid;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Outgoing mail configuration.
    #[serde(default)]
    pub email: EmailConfig,
    /// Accounting rules and notification recipients.
    #[serde(default)]
    pub accounting: AccountingConfig,
    /// Background worker schedule.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// SMTP configuration for notification mail.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether mail is actually sent. When false, notices are only logged.
    #[serde(default)]
    pub enabled: bool,
    /// SMTP relay host.
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub smtp_username: String,
    /// SMTP password.
    #[serde(default)]
    pub smtp_password: String,
    /// Sender address.
    #[serde(default = "default_from_email")]
    pub from_email: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Public URL of the budget portal, linked from notices.
    #[serde(default)]
    pub website_url: String,
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    1025
}

fn default_from_email() -> String {
    "budgets@localhost".to_string()
}

fn default_from_name() -> String {
    "BudgetGuard".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            website_url: String::new(),
        }
    }
}

/// Accounting behaviour and the people it reports to.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountingConfig {
    /// Identity recorded on rows written by scheduled jobs.
    #[serde(default = "default_system_admin")]
    pub system_admin: Uuid,
    /// Recipients of administrator summaries and undeliverable notices.
    #[serde(default)]
    pub admin_email_recipients: Vec<String>,
    /// Role names whose members are notified about their subscription.
    #[serde(default = "default_notifiable_roles")]
    pub notifiable_roles: Vec<String>,
    /// Role names whose assignment changes are worth telling users about.
    #[serde(default = "default_notifiable_roles")]
    pub roles_filter: Vec<String>,
    /// Days a disabled subscription must stay unchanged before it is abolished.
    #[serde(default = "default_abolishment_inactive_days")]
    pub abolishment_inactive_days: i64,
}

/// Identity used for rows written without a human administrator.
pub const SYSTEM_ADMIN: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0b9d);

fn default_system_admin() -> Uuid {
    SYSTEM_ADMIN
}

fn default_notifiable_roles() -> Vec<String> {
    vec!["Contributor".to_string()]
}

fn default_abolishment_inactive_days() -> i64 {
    90
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            system_admin: default_system_admin(),
            admin_email_recipients: Vec::new(),
            notifiable_roles: default_notifiable_roles(),
            roles_filter: default_notifiable_roles(),
            abolishment_inactive_days: default_abolishment_inactive_days(),
        }
    }
}

/// Schedule for the daily routine.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// UTC wall-clock time at which the daily routine runs.
    #[serde(default = "default_daily_run_time")]
    pub daily_run_time: NaiveTime,
}

fn default_daily_run_time() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            daily_run_time: default_daily_run_time(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("BUDGETGUARD")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("accounting.admin_email_recipients")
                    .with_list_parse_key("accounting.notifiable_roles")
                    .with_list_parse_key("accounting.roles_filter")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("BUDGETGUARD__DATABASE__URL", Some("postgres://localhost/budgets")),
                ("BUDGETGUARD__ACCOUNTING__ABOLISHMENT_INACTIVE_DAYS", Some("120")),
                ("BUDGETGUARD__ACCOUNTING__ROLES_FILTER", Some("Owner,Contributor")),
                (
                    "BUDGETGUARD__ACCOUNTING__ADMIN_EMAIL_RECIPIENTS",
                    Some("ops@example.com,finance@example.com"),
                ),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/budgets");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.accounting.abolishment_inactive_days, 120);
                assert_eq!(
                    config.accounting.admin_email_recipients,
                    vec!["ops@example.com", "finance@example.com"]
                );
                assert_eq!(config.accounting.notifiable_roles, vec!["Contributor"]);
                assert_eq!(config.accounting.roles_filter, vec!["Owner", "Contributor"]);
                assert!(!config.email.enabled);
            },
        );
    }

    #[test]
    fn test_accounting_defaults() {
        let accounting = AccountingConfig::default();
        assert_eq!(accounting.system_admin, SYSTEM_ADMIN);
        assert_eq!(accounting.abolishment_inactive_days, 90);
        assert!(accounting.admin_email_recipients.is_empty());
        assert_eq!(accounting.roles_filter, vec!["Contributor"]);
    }

    #[test]
    fn test_worker_default_run_time() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.daily_run_time, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
    }
}
