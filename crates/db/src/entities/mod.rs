//! `SeaORM` entity definitions for the accounting schema.

pub mod allocations;
pub mod approvals;
pub mod cost_recovery;
pub mod cost_recovery_log;
pub mod emails;
pub mod failed_emails;
pub mod finance;
pub mod persistence;
pub mod sea_orm_active_enums;
pub mod status;
pub mod subscription;
pub mod subscription_details;
pub mod usage;
pub mod usage_view;

pub mod prelude {
    //! Entity aliases.

    pub use super::allocations::Entity as Allocations;
    pub use super::approvals::Entity as Approvals;
    pub use super::cost_recovery::Entity as CostRecovery;
    pub use super::cost_recovery_log::Entity as CostRecoveryLog;
    pub use super::emails::Entity as Emails;
    pub use super::failed_emails::Entity as FailedEmails;
    pub use super::finance::Entity as Finance;
    pub use super::persistence::Entity as Persistence;
    pub use super::status::Entity as Status;
    pub use super::subscription::Entity as Subscription;
    pub use super::subscription_details::Entity as SubscriptionDetails;
    pub use super::usage::Entity as Usage;
    pub use super::usage_view::Entity as UsageView;
}
