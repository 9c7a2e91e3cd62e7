//! Tests for installation token handling.

use super::*;

fn token_expiring_in(minutes: i64) -> InstallationToken {
    InstallationToken::new(
        "ghs_testtoken".to_string(),
        InstallationId::new(42),
        Utc::now() + Duration::minutes(minutes),
    )
}

#[test]
fn test_fresh_token_is_not_expired() {
    let token = token_expiring_in(60);
    assert!(!token.is_expired());
    assert_eq!(token.installation_id(), InstallationId::new(42));
    assert_eq!(token.value(), "ghs_testtoken");
}

#[test]
fn test_past_expiry_means_expired() {
    let token = token_expiring_in(-1);
    assert!(token.is_expired());
}

#[test]
fn test_expires_within_margin() {
    let token = token_expiring_in(3);

    assert!(token.expires_within(Duration::minutes(5)));
    assert!(!token.expires_within(Duration::minutes(1)));
}

#[test]
fn test_debug_output_redacts_token_value() {
    let token = token_expiring_in(60);
    let debug = format!("{:?}", token);

    assert!(debug.contains("<REDACTED>"));
    assert!(!debug.contains("ghs_testtoken"));
}
