//! Tests for webhook signature verification.

use super::*;
use std::sync::Arc;

fn sign(payload: &[u8], secret: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn verifier_with_secret(secret: &str) -> SignatureVerifier {
    SignatureVerifier::new(Arc::new(StaticSecretProvider::new(secret.to_string())))
}

#[tokio::test]
async fn test_valid_signature_verifies() {
    let secret = "test_webhook_secret";
    let verifier = verifier_with_secret(secret);
    let payload = br#"{"action":"closed","number":7,"pull_request":{"merged":true}}"#;

    let signature = sign(payload, secret);

    let is_valid = verifier
        .verify(payload, &signature)
        .await
        .expect("verification should not error");
    assert!(is_valid);
}

#[tokio::test]
async fn test_signature_from_wrong_secret_is_rejected() {
    let verifier = verifier_with_secret("right_secret");
    let payload = br#"{"action":"opened"}"#;

    let signature = sign(payload, "wrong_secret");

    let is_valid = verifier
        .verify(payload, &signature)
        .await
        .expect("verification should not error");
    assert!(!is_valid);
}

#[tokio::test]
async fn test_single_byte_tamper_is_detected() {
    let secret = "test_webhook_secret";
    let verifier = verifier_with_secret(secret);
    let payload = br#"{"action":"closed","number":7}"#.to_vec();

    let signature = sign(&payload, secret);

    // Flip one byte after signing.
    let mut tampered = payload.clone();
    tampered[10] ^= 0x01;

    let is_valid = verifier
        .verify(&tampered, &signature)
        .await
        .expect("verification should not error");
    assert!(!is_valid);
}

#[tokio::test]
async fn test_reserialized_body_does_not_verify() {
    // Whitespace differences break the digest; verification must run over
    // the exact bytes received, never a parsed-then-restringified body.
    let secret = "test_webhook_secret";
    let verifier = verifier_with_secret(secret);

    let original = br#"{"action": "closed"}"#;
    let reserialized = br#"{"action":"closed"}"#;

    let signature = sign(original, secret);

    let is_valid = verifier
        .verify(reserialized, &signature)
        .await
        .expect("verification should not error");
    assert!(!is_valid);
}

#[tokio::test]
async fn test_missing_prefix_is_a_non_match() {
    // The header is attacker-controlled; a missing prefix must look exactly
    // like a wrong digest, never like a server-side failure.
    let verifier = verifier_with_secret("secret");

    let is_valid = verifier
        .verify(b"{}", "deadbeef")
        .await
        .expect("malformed header is a non-match, not an error");
    assert!(!is_valid);
}

#[tokio::test]
async fn test_non_hex_signature_is_a_non_match() {
    let verifier = verifier_with_secret("secret");

    let is_valid = verifier
        .verify(b"{}", "sha256=not-hex!")
        .await
        .expect("malformed header is a non-match, not an error");
    assert!(!is_valid);
}

#[tokio::test]
async fn test_truncated_digest_is_rejected_not_errored() {
    let secret = "secret";
    let verifier = verifier_with_secret(secret);
    let payload = b"{}";

    let full = sign(payload, secret);
    // Drop the last two hex characters: still valid hex, wrong length.
    let truncated = &full[..full.len() - 2];

    let is_valid = verifier
        .verify(payload, truncated)
        .await
        .expect("length mismatch is a non-match, not an error");
    assert!(!is_valid);
}

#[test]
fn test_debug_output_redacts_secret_provider() {
    let verifier = verifier_with_secret("super-secret");
    let debug = format!("{:?}", verifier);

    assert!(debug.contains("<REDACTED>"));
    assert!(!debug.contains("super-secret"));
}
