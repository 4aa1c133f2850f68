//! Common types used across the application.

pub mod currency;

pub use currency::{Currency, DEFAULT_CURRENCY};
