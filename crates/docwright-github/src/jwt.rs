//! App JWT generation for GitHub App authentication.
//!
//! GitHub requires App JWTs to be signed with RS256, to carry `iss` (the app
//! id), `iat`, and `exp` claims, and to expire no more than ten minutes after
//! issuance. The issued-at claim is backdated slightly to absorb clock skew
//! between this host and GitHub.

use crate::error::AuthError;
use crate::AppId;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

/// Maximum App JWT validity accepted by GitHub.
const MAX_VALIDITY_MINUTES: i64 = 10;

/// Backdating applied to `iat` to tolerate clock skew.
const ISSUED_AT_SKEW_SECONDS: i64 = 30;

/// A signed App JWT with its expiry metadata.
#[derive(Clone)]
pub struct AppJwt {
    token: String,
    app_id: AppId,
    expires_at: DateTime<Utc>,
}

impl AppJwt {
    /// The encoded JWT string, suitable for a `Bearer` authorization header.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn app_id(&self) -> AppId {
        self.app_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

// Security: Don't expose the signed token in debug output
impl std::fmt::Debug for AppJwt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppJwt")
            .field("token", &"<REDACTED>")
            .field("app_id", &self.app_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Serialize)]
struct Claims {
    iss: String,
    iat: i64,
    exp: i64,
}

/// Interface for App JWT signing.
///
/// Abstracts JWT generation so the token exchanger can be tested with a
/// deterministic signer instead of a real RSA key.
pub trait JwtSigner: Send + Sync {
    /// Sign a fresh App JWT for `app_id`.
    fn sign(&self, app_id: AppId) -> Result<AppJwt, AuthError>;
}

/// RS256 signer backed by the App's RSA private key.
pub struct Rs256JwtSigner {
    encoding_key: EncodingKey,
    validity: Duration,
}

impl Rs256JwtSigner {
    /// Build a signer from a PEM-encoded RSA private key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidPrivateKey`] when the PEM cannot be parsed.
    pub fn from_pem(pem: &str) -> Result<Self, AuthError> {
        let encoding_key =
            EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| AuthError::InvalidPrivateKey {
                message: e.to_string(),
            })?;

        Ok(Self {
            encoding_key,
            validity: Duration::minutes(MAX_VALIDITY_MINUTES),
        })
    }

    /// Override the JWT validity window.
    ///
    /// Values above GitHub's ten-minute maximum are clamped at signing time.
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }
}

impl JwtSigner for Rs256JwtSigner {
    fn sign(&self, app_id: AppId) -> Result<AppJwt, AuthError> {
        let validity = self.validity.min(Duration::minutes(MAX_VALIDITY_MINUTES));

        let issued_at = Utc::now() - Duration::seconds(ISSUED_AT_SKEW_SECONDS);
        let expires_at = issued_at + validity;

        let claims = Claims {
            iss: app_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )
        .map_err(|e| AuthError::JwtSigning {
            message: e.to_string(),
        })?;

        Ok(AppJwt {
            token,
            app_id,
            expires_at,
        })
    }
}

impl std::fmt::Debug for Rs256JwtSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rs256JwtSigner")
            .field("encoding_key", &"<REDACTED>")
            .field("validity", &self.validity)
            .finish()
    }
}

#[cfg(test)]
#[path = "jwt_tests.rs"]
mod tests;
