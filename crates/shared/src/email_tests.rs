use super::*;
use crate::config::EmailConfig;

fn service() -> EmailService {
    EmailService::new(EmailConfig {
        from_email: "budgets@example.com".to_string(),
        from_name: "Budgets".to_string(),
        ..EmailConfig::default()
    })
}

#[test]
fn test_email_config_default() {
    let config = EmailConfig::default();
    assert_eq!(config.smtp_host, "localhost");
    assert_eq!(config.smtp_port, 1025);
    assert!(!config.enabled);
}

#[tokio::test]
async fn test_create_transport_with_credentials() {
    let service = EmailService::new(EmailConfig {
        smtp_username: "user".to_string(),
        smtp_password: "password".to_string(),
        ..EmailConfig::default()
    });
    assert!(service.create_transport().is_ok());
}

#[test]
fn test_build_message_addresses_every_recipient() {
    let recipients = vec!["a@example.com".to_string(), "b@example.com".to_string()];
    let message = service()
        .build_message(&recipients, "We will turn off your subscription", "body")
        .unwrap();

    let to: Vec<String> = message
        .envelope()
        .to()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(to, vec!["a@example.com", "b@example.com"]);
}

#[test]
fn test_build_message_rejects_empty_recipients() {
    let err = service().build_message(&[], "subject", "body").unwrap_err();
    assert!(matches!(err, EmailError::NoRecipients));
}

#[test]
fn test_build_message_rejects_bad_address() {
    let err = service()
        .build_message(&["not an address".to_string()], "subject", "body")
        .unwrap_err();
    assert!(matches!(err, EmailError::InvalidAddress(_)));
}

#[test]
fn test_email_error_display() {
    assert_eq!(
        format!("{}", EmailError::BuildError("msg".into())),
        "Failed to build email: msg"
    );
    assert_eq!(
        format!("{}", EmailError::SendError("msg".into())),
        "Failed to send email: msg"
    );
    assert_eq!(
        format!("{}", EmailError::InvalidAddress("msg".into())),
        "Invalid email address: msg"
    );
    assert_eq!(format!("{}", EmailError::NoRecipients), "No recipients");
}
