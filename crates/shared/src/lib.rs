//! Shared types, errors, and configuration for BudgetGuard.
//!
//! This crate provides common types used across all other crates:
//! - Application-wide error types
//! - Configuration management
//! - SMTP mail transport
//! - The ledger currency

pub mod config;
pub mod email;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use email::{EmailError, EmailService};
pub use error::{AppError, AppResult};
pub use types::{Currency, DEFAULT_CURRENCY};
