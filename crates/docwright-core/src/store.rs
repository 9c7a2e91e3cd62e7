//! Backing-store queries for cron work enumeration.
//!
//! The backing store (the "core" service owning teams, repositories, and
//! document records) is an external collaborator; this module specifies only
//! the query surface the cron dispatcher needs.

use crate::error::StoreError;
use crate::{InstallationId, RepositoryRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A repository eligible for a cron-triggered documentation run.
///
/// Ephemeral; exists only for the duration of one cron tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleWorkItem {
    pub team_id: String,
    pub repository: RepositoryRef,
    pub installation_id: InstallationId,
}

/// Query surface of the backing store.
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    /// All repositories with the named feature enabled.
    async fn repositories_with_feature(
        &self,
        feature: &str,
    ) -> Result<Vec<EligibleWorkItem>, StoreError>;
}

/// Production [`WorkItemStore`] backed by the core service's HTTP API.
pub struct HttpWorkItemStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpWorkItemStore {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl WorkItemStore for HttpWorkItemStore {
    async fn repositories_with_feature(
        &self,
        feature: &str,
    ) -> Result<Vec<EligibleWorkItem>, StoreError> {
        let url = format!("{}/internal/repositories", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("feature", feature), ("enabled", "true")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Query {
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(|e| StoreError::Decode {
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for HttpWorkItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpWorkItemStore")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
