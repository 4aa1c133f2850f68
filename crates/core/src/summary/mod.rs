//! Per-subscription budget summary.
//!
//! The database layer runs one aggregate query per ledger table and hands
//! the typed rows to [`merge`], which joins them by subscription id.

pub mod merge;
pub mod types;

pub use merge::{SummaryParts, merge};
pub use types::{
    AllocationTotals, ApprovalTotals, LatestDetails, LatestPersistence, LatestStatus,
    RoleAssignment, SubscriptionFilter, SubscriptionRow, SubscriptionState, SubscriptionSummary,
    UsageTotals,
};
