//! Desired-state reconciliation.
//!
//! This module implements the pure half of the reconciler:
//! - Disable-reason classification with an epsilon tolerance
//! - Budget clamping adjustments for expired and abolished subscriptions
//! - The status rows a reconciliation pass has to write
//! - Which subscriptions the controller still has to switch
//! - When users are warned about expiry, spend and snapshot changes

pub mod adjustment;
pub mod alerts;
pub mod classify;
pub mod desired;
pub mod plan;


pub use adjustment::{
    ABOLISHMENT_ADJUSTMENT_MSG, AbolishmentAdjustment, ApprovalAdjustment, BudgetAdjustment,
    EXPIRY_ADJUSTMENT_MSG, abolishment_adjustment, expiry_adjustment,
};
pub use alerts::{
    OverBudgetWarning, RoleHolder, SnapshotNotice, SubscriptionSnapshot, UsageAlert,
    over_budget_warning, percentage_used, should_send_expiry_warning, snapshot_notices,
    usage_alerts,
};
pub use classify::{ADJUSTMENT_DELTA, BillingStatus, DisableReasons, classify, is_expired, is_over_budget};
pub use desired::{PendingChange, pending_change};
pub use plan::{DesiredStatusChange, ReconcilePlan, ReconcileReport, plan};
