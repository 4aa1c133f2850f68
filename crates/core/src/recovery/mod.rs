//! Monthly cost recovery.
//!
//! Usage cost for a month is attributed to the finance records covering it,
//! highest priority first, one month at a time from the last committed month.

pub mod allocate;
pub mod error;
pub mod month;

#[cfg(test)]
mod tests;

pub use allocate::{FinanceSlice, Recovery, allocate};
pub use error::RecoveryError;
pub use month::{RecoveryMonth, validate_month};
