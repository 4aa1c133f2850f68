//! Application-wide error types.
//!
//! Every failure that crosses a component boundary is expressed as an
//! [`AppError`], which carries a stable machine-checkable kind (see
//! [`AppError::error_code`]) and a human-readable detail that names the
//! offending values.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error (bad dates, wrong currency, out-of-order month, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflict (duplicate entry, lock held elsewhere, recovered finance row).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The lock store failed while acquiring a named lock.
    #[error("Lock unavailable: {0}")]
    LockAcquisition(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// External service error.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::LockAcquisition(_) => 503,
            Self::Database(_) | Self::ExternalService(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::LockAcquisition(_) => "LOCK_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the detail message without the kind prefix.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Conflict(msg)
            | Self::LockAcquisition(msg)
            | Self::Database(msg)
            | Self::ExternalService(msg)
            | Self::Internal(msg) => msg,
        }
    }

    /// Returns true if a caller may reasonably retry the operation later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::LockAcquisition(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
