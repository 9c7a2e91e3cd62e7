//! Configuration types for the HTTP service.
//!
//! Every field carries a serde default so an unconfigured environment still
//! deserializes; [`ServiceConfig::validate`] then rejects combinations that
//! must not reach production (empty secrets, the dev bypass).

use serde::{Deserialize, Serialize};

/// Which environment the service believes it is running in.
///
/// Gates the webhook dev bypass: the bypass can only ever activate outside
/// production, regardless of what the rest of the configuration says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    pub environment: RuntimeEnvironment,
    pub server: ServerConfig,
    pub webhooks: WebhookConfig,
    pub github: GitHubConfig,
    pub queue: QueueConfig,
    pub store: StoreConfig,
    pub cron: CronConfig,
}

impl ServiceConfig {
    /// Reject configurations that are unsafe or unusable.
    ///
    /// Development defaults are permissive; production requires real
    /// secrets and forbids the signature bypass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                field: "server.port".to_string(),
                message: "must be non-zero".to_string(),
            });
        }

        if !self.webhooks.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "webhooks.endpoint_path".to_string(),
                message: "must start with '/'".to_string(),
            });
        }

        if self.environment.is_production() {
            if self.webhooks.secret.is_empty() {
                return Err(ConfigError::MissingSecret {
                    field: "webhooks.secret".to_string(),
                });
            }
            if self.cron.shared_secret.is_empty() {
                return Err(ConfigError::MissingSecret {
                    field: "cron.shared_secret".to_string(),
                });
            }
            if self.github.private_key_pem.is_empty() {
                return Err(ConfigError::MissingSecret {
                    field: "github.private_key_pem".to_string(),
                });
            }
            if self.webhooks.allow_dev_bypass {
                return Err(ConfigError::Invalid {
                    field: "webhooks.allow_dev_bypass".to_string(),
                    message: "must be false in production".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Whether the webhook receiver may honor the dev bypass header.
    pub fn dev_bypass_enabled(&self) -> bool {
        !self.environment.is_production() && self.webhooks.allow_dev_bypass
    }
}

/// Configuration errors surfaced at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration field '{field}' is invalid: {message}")]
    Invalid { field: String, message: String },

    #[error("Configuration field '{field}' must be set in production")]
    MissingSecret { field: String },
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Graceful shutdown window in seconds.
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Webhook intake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Mount path for the platform webhook endpoint.
    pub endpoint_path: String,

    /// Shared webhook secret (literal; replace with a secret manager
    /// integration before production).
    pub secret: String,

    /// Allow the dev bypass header to skip signature verification. Only
    /// honored outside production.
    pub allow_dev_bypass: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/webhooks/github".to_string(),
            secret: String::new(),
            allow_dev_bypass: false,
        }
    }
}

/// GitHub App credentials and API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub app_id: u64,

    /// PEM-encoded RSA private key of the App.
    pub private_key_pem: String,

    /// API base URL; override for GitHub Enterprise.
    pub api_url: String,

    /// Installation client cache TTL in minutes. Must stay inside the
    /// one-hour installation token lifetime.
    pub client_ttl_minutes: i64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            app_id: 0,
            private_key_pem: String::new(),
            api_url: "https://api.github.com".to_string(),
            client_ttl_minutes: 55,
        }
    }
}

/// Task queue backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueueBackend {
    /// External queue service reached over HTTP.
    Http { enqueue_url: String },

    /// Process-local queue for development; tasks are recorded, never
    /// delivered.
    Memory,
}

impl Default for QueueBackend {
    fn default() -> Self {
        Self::Memory
    }
}

/// Task queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub backend: QueueBackend,

    /// Processing endpoint tasks are delivered to.
    pub target_path: String,

    /// Audience identifying this service to the queue's auth layer.
    pub audience: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            target_path: "/internal/tasks/process".to_string(),
            audience: "docwright-service".to_string(),
        }
    }
}

/// Backing-store ("core" service) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
        }
    }
}

/// Cron trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CronConfig {
    /// Mount path for the cron trigger endpoint.
    pub endpoint_path: String,

    /// Shared secret the scheduler must present; compared in constant
    /// time.
    pub shared_secret: String,

    /// Feature flag selecting eligible repositories.
    pub feature: String,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/internal/cron/docs-refresh".to_string(),
            shared_secret: String::new(),
            feature: "documentation".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
