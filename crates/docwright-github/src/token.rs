//! Installation access-token exchange.
//!
//! Exchanges a signed App JWT for an installation-scoped access token via
//! `POST /app/installations/{id}/access_tokens`. This is the expensive
//! credential exchange the client cache exists to avoid repeating.

use crate::error::AuthError;
use crate::jwt::JwtSigner;
use crate::{AppId, InstallationId};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An installation-scoped access token with its expiry.
///
/// GitHub installation tokens currently live for one hour; the expiry
/// returned by the API is authoritative and is used to bound the client
/// cache TTL.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct InstallationToken {
    token: String,
    #[zeroize(skip)]
    installation_id: InstallationId,
    #[zeroize(skip)]
    expires_at: DateTime<Utc>,
}

impl InstallationToken {
    pub fn new(
        token: String,
        installation_id: InstallationId,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            installation_id,
            expires_at,
        }
    }

    /// The raw token value for an `Authorization: token <...>` header.
    pub fn value(&self) -> &str {
        &self.token
    }

    pub fn installation_id(&self) -> InstallationId {
        self.installation_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Whether the token expires within the given margin from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at <= Utc::now() + margin
    }
}

// Security: Don't expose the token value in debug output
impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("token", &"<REDACTED>")
            .field("installation_id", &self.installation_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Interface for minting installation tokens.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Mint a fresh access token scoped to `installation_id`.
    async fn exchange(&self, installation_id: InstallationId)
        -> Result<InstallationToken, AuthError>;
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Production [`TokenExchanger`] backed by the GitHub REST API.
pub struct HttpTokenExchanger {
    http: reqwest::Client,
    api_url: String,
    app_id: AppId,
    signer: Arc<dyn JwtSigner>,
    user_agent: String,
}

impl HttpTokenExchanger {
    /// Create a new exchanger.
    ///
    /// # Arguments
    ///
    /// * `api_url` - GitHub API base URL, e.g. `https://api.github.com`
    /// * `app_id` - The GitHub App id used as the JWT issuer
    /// * `signer` - Signer producing App JWTs for the exchange request
    pub fn new(
        http: reqwest::Client,
        api_url: String,
        app_id: AppId,
        signer: Arc<dyn JwtSigner>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            app_id,
            signer,
            user_agent: "docwright".to_string(),
        }
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        let jwt = self.signer.sign(self.app_id)?;

        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation_id
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(jwt.token())
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(
                installation_id = %installation_id,
                status = status.as_u16(),
                "Installation token exchange rejected"
            );
            return Err(AuthError::TokenExchange {
                status: status.as_u16(),
                message,
            });
        }

        let body: AccessTokenResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::UnexpectedResponse {
                    message: format!("access token response could not be decoded: {}", e),
                })?;

        debug!(
            installation_id = %installation_id,
            expires_at = %body.expires_at,
            "Minted installation access token"
        );

        Ok(InstallationToken::new(
            body.token,
            installation_id,
            body.expires_at,
        ))
    }
}

impl std::fmt::Debug for HttpTokenExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenExchanger")
            .field("api_url", &self.api_url)
            .field("app_id", &self.app_id)
            .finish()
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
