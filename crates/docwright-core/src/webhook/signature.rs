//! Webhook signature verification.
//!
//! Verifies that a raw request body was produced by a holder of the shared
//! webhook secret, using HMAC-SHA256 in GitHub's `sha256=<hex>` header format
//! and a constant-time comparison. Verification always runs over the exact
//! bytes received; a parsed-then-reserialized body would break the digest on
//! whitespace and key ordering alone.

use crate::error::SignatureError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Source of the shared webhook secret.
///
/// Abstracted so deployments can plug in a secret manager without touching
/// the verifier. Retrieval is the only suspension point in verification.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn webhook_secret(&self) -> Result<String, SignatureError>;
}

/// A [`SecretProvider`] backed by a literal secret from configuration.
///
/// Development and testing only; construction logs a WARN so operators are
/// reminded to move the secret out of configuration before production.
pub struct StaticSecretProvider {
    secret: String,
}

impl StaticSecretProvider {
    pub fn new(secret: String) -> Self {
        warn!(
            "StaticSecretProvider is active; literal webhook secrets in configuration \
             should be replaced with a secret manager before production use"
        );
        Self { secret }
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn webhook_secret(&self) -> Result<String, SignatureError> {
        Ok(self.secret.clone())
    }
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for StaticSecretProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSecretProvider")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Verifies webhook signatures with HMAC-SHA256.
#[derive(Clone)]
pub struct SignatureVerifier {
    secrets: Arc<dyn SecretProvider>,
}

impl SignatureVerifier {
    pub fn new(secrets: Arc<dyn SecretProvider>) -> Self {
        Self { secrets }
    }

    /// Verify a signature header against the raw payload bytes.
    ///
    /// Returns `Ok(true)` when the digest matches and `Ok(false)` when it
    /// does not, including a header that does not even parse: the header is
    /// attacker-controlled, and a sender presenting garbage must see the
    /// same rejection as one presenting a wrong digest. `Err` is reserved
    /// for failures on our side of the comparison (missing secret, unusable
    /// HMAC key).
    pub async fn verify(&self, payload: &[u8], signature: &str) -> Result<bool, SignatureError> {
        let signature_bytes = match Self::parse_signature(signature) {
            Some(bytes) => bytes,
            None => {
                warn!("Signature header is malformed; treating as non-match");
                return Ok(false);
            }
        };

        let secret = self.secrets.webhook_secret().await?;

        let expected = Self::compute_hmac(payload, &secret)?;

        Ok(Self::constant_time_compare(&signature_bytes, &expected))
    }

    /// Decode the `sha256=<hex>` header format into raw digest bytes.
    ///
    /// `None` for a missing prefix or a non-hex digest; the caller treats
    /// both as a non-match.
    fn parse_signature(signature: &str) -> Option<Vec<u8>> {
        let hex_part = signature.strip_prefix("sha256=")?;
        hex::decode(hex_part).ok()
    }

    fn compute_hmac(payload: &[u8], secret: &str) -> Result<Vec<u8>, SignatureError> {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        type HmacSha256 = Hmac<Sha256>;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
            SignatureError::HmacKey {
                message: e.to_string(),
            }
        })?;
        mac.update(payload);

        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
        use subtle::ConstantTimeEq;

        // Length is public information for a fixed-width digest.
        if a.len() != b.len() {
            return false;
        }

        a.ct_eq(b).into()
    }
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secrets", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
