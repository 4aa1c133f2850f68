//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod abolishment;
pub mod budget;
pub mod cost_recovery;
pub mod desired_state;
pub mod finance;
pub mod monitoring;
pub mod subscription;
pub mod summary;
pub mod usage;

pub use abolishment::{ABOLISHMENT_SUBJECT, AbolishmentRepository};
pub use budget::BudgetRepository;
pub use cost_recovery::CostRecoveryRepository;
pub use desired_state::DesiredStateRepository;
pub use finance::FinanceRepository;
pub use monitoring::{BudgetMonitor, MonitorReport};
pub use subscription::{SubscriptionDetailsInput, SubscriptionRepository};
pub use summary::SummaryRepository;
pub use usage::{USAGE_VIEW, UsageInput, UsageRepository};

/// Rows per multi-row statement, well under PostgreSQL's 65535 bind
/// parameters.
pub(crate) const ROWS_PER_STATEMENT: usize = 1000;
