//! Installation-scoped API clients and the cached client factory.

use crate::cache::TtlCache;
use crate::error::AuthError;
use crate::token::{InstallationToken, TokenExchanger};
use crate::InstallationId;
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};

/// API client authenticated as a single installation.
///
/// Wraps a [`reqwest::Client`] and the installation token minted for one
/// installation. The client does not refresh its own token; the
/// [`CachedClientFactory`] bounds each client's cache lifetime to stay inside
/// the token's validity, so an expired client is simply rebuilt.
pub struct InstallationClient {
    http: reqwest::Client,
    api_url: String,
    token: InstallationToken,
    user_agent: String,
}

impl InstallationClient {
    pub fn new(http: reqwest::Client, api_url: String, token: InstallationToken) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            user_agent: "docwright".to_string(),
        }
    }

    pub fn installation_id(&self) -> InstallationId {
        self.token.installation_id()
    }

    /// Whether the wrapped token has already expired.
    pub fn token_expired(&self) -> bool {
        self.token.is_expired()
    }

    /// GET an API path (relative, e.g. `/repos/{owner}/{repo}`) as JSON.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, AuthError> {
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("token {}", self.token.value()))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::UnexpectedResponse {
                message: format!("response body could not be decoded: {}", e),
            })
    }

    /// Fetch repository metadata.
    pub async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<serde_json::Value, AuthError> {
        self.get_json(&format!("/repos/{}/{}", owner, name)).await
    }
}

impl std::fmt::Debug for InstallationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationClient")
            .field("api_url", &self.api_url)
            .field("installation_id", &self.installation_id())
            .finish()
    }
}

/// Resolves an authenticated client for an installation.
///
/// The task consumer depends on this trait rather than the concrete factory
/// so tests can inject a provider that never touches the network.
#[async_trait]
pub trait InstallationClientProvider: Send + Sync {
    /// Return a client authenticated as `installation_id`, minting
    /// credentials if no usable cached client exists.
    async fn client_for(
        &self,
        installation_id: InstallationId,
    ) -> Result<Arc<InstallationClient>, AuthError>;
}

/// Default client cache TTL.
///
/// Installation tokens live for one hour; caching for 55 minutes leaves a
/// margin so a client handed out near the end of the TTL still carries a
/// valid token for the duration of a task.
const DEFAULT_CLIENT_TTL_MINUTES: i64 = 55;

/// [`InstallationClientProvider`] that caches clients per installation.
///
/// On a cache miss the factory performs the full credential exchange (App
/// JWT signing plus the installation token round trip) and stores the built
/// client with a TTL inside the token lifetime. On a hit the cached client is
/// returned without any network traffic. Expired entries are evicted lazily
/// by the underlying [`TtlCache`].
///
/// Concurrent cold misses for the same installation may mint duplicate
/// tokens; the exchange is idempotent on the GitHub side, so the duplicate
/// costs one extra round trip and nothing else.
pub struct CachedClientFactory {
    exchanger: Arc<dyn TokenExchanger>,
    cache: TtlCache<InstallationId, Arc<InstallationClient>>,
    http: reqwest::Client,
    api_url: String,
    client_ttl: Duration,
}

impl CachedClientFactory {
    pub fn new(exchanger: Arc<dyn TokenExchanger>, api_url: String) -> Self {
        Self {
            exchanger,
            cache: TtlCache::new(),
            http: reqwest::Client::new(),
            api_url,
            client_ttl: Duration::minutes(DEFAULT_CLIENT_TTL_MINUTES),
        }
    }

    /// Override the cache TTL. Intended for tests and for deployments that
    /// shorten token lifetimes.
    pub fn with_client_ttl(mut self, ttl: Duration) -> Self {
        self.client_ttl = ttl;
        self
    }

    /// Drop the cached client for an installation, forcing the next lookup
    /// to mint fresh credentials. Used when GitHub reports a revoked token.
    pub async fn invalidate(&self, installation_id: InstallationId) {
        info!(installation_id = %installation_id, "Invalidating cached installation client");
        self.cache.invalidate(&installation_id).await;
    }
}

#[async_trait]
impl InstallationClientProvider for CachedClientFactory {
    async fn client_for(
        &self,
        installation_id: InstallationId,
    ) -> Result<Arc<InstallationClient>, AuthError> {
        self.cache
            .get_or_try_insert_with(installation_id, Some(self.client_ttl), || async {
                debug!(
                    installation_id = %installation_id,
                    "Client cache miss, performing credential exchange"
                );
                let token = self.exchanger.exchange(installation_id).await?;
                Ok(Arc::new(InstallationClient::new(
                    self.http.clone(),
                    self.api_url.clone(),
                    token,
                )))
            })
            .await
    }
}

impl std::fmt::Debug for CachedClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedClientFactory")
            .field("api_url", &self.api_url)
            .field("client_ttl", &self.client_ttl)
            .finish()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
