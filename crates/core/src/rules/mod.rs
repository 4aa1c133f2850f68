//! Validation rules for budget ledger writes.
//!
//! Every write to approvals, allocations and finance rows is checked here
//! against the subscription's current summary before anything is stored.

pub mod allocation;
pub mod approval;
pub mod error;
pub mod finance;

#[cfg(test)]
mod tests;

pub use allocation::{NewAllocation, check_allocation};
pub use approval::{FORCE_WINDOW_DAYS, NewApproval, check_approval};
pub use error::LedgerError;
pub use finance::{NewFinance, check_finance_update, check_new_finance};
