//! Core business logic for BudgetGuard.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `summary` - Per-subscription budget summary and its aggregates
//! - `reconcile` - Enable/disable decisions and budget clamping
//! - `recovery` - Monthly cost recovery against finance records
//! - `rules` - Validation of approvals, allocations and finance records
//! - `locks` - Advisory lock names and keys

pub mod locks;
pub mod reconcile;
pub mod recovery;
pub mod rules;
pub mod summary;

pub use locks::{LockName, lock_key};
