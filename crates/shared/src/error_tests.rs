use super::*;
use rstest::rstest;

#[rstest]
#[case(AppError::NotFound("x".into()), 404, "NOT_FOUND")]
#[case(AppError::Validation("x".into()), 400, "VALIDATION_ERROR")]
#[case(AppError::Conflict("x".into()), 409, "CONFLICT")]
#[case(AppError::LockAcquisition("x".into()), 503, "LOCK_UNAVAILABLE")]
#[case(AppError::Database("x".into()), 500, "DATABASE_ERROR")]
#[case(AppError::ExternalService("x".into()), 500, "EXTERNAL_SERVICE_ERROR")]
#[case(AppError::Internal("x".into()), 500, "INTERNAL_ERROR")]
fn test_status_and_error_codes(#[case] error: AppError, #[case] status: u16, #[case] code: &str) {
    assert_eq!(error.status_code(), status);
    assert_eq!(error.error_code(), code);
}

#[test]
fn test_error_display() {
    assert_eq!(
        AppError::NotFound("subscription 42".into()).to_string(),
        "Not found: subscription 42"
    );
    assert_eq!(
        AppError::Validation("Expected 2001-02".into()).to_string(),
        "Validation error: Expected 2001-02"
    );
    assert_eq!(
        AppError::Conflict("msg".into()).to_string(),
        "Conflict: msg"
    );
    assert_eq!(
        AppError::LockAcquisition("msg".into()).to_string(),
        "Lock unavailable: msg"
    );
    assert_eq!(
        AppError::Database("msg".into()).to_string(),
        "Database error: msg"
    );
}

#[test]
fn test_detail_strips_kind() {
    let error = AppError::Validation("Expected 2001-02".into());
    assert_eq!(error.detail(), "Expected 2001-02");
}

#[test]
fn test_transient_kinds() {
    assert!(AppError::Conflict(String::new()).is_transient());
    assert!(AppError::LockAcquisition(String::new()).is_transient());
    assert!(!AppError::Validation(String::new()).is_transient());
    assert!(!AppError::Database(String::new()).is_transient());
}
