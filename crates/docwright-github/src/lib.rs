//! # Docwright GitHub Integration
//!
//! GitHub App authentication and installation-scoped API clients.
//!
//! A GitHub App authenticates in two steps: it signs a short-lived JWT with
//! its private key to prove app identity, then exchanges that JWT for an
//! installation access token scoped to a single installation. Installation
//! tokens are the expensive part of the exchange (one network round trip per
//! mint), so clients built around them are cached with a TTL that stays
//! inside the token's one-hour lifetime.
//!
//! ## Module Organization
//!
//! - [`jwt`] - App JWT generation (RS256)
//! - [`token`] - Installation access-token exchange
//! - [`cache`] - Generic TTL cache with lazy check-on-read eviction
//! - [`client`] - Installation-scoped API clients and the cached factory
//! - [`error`] - Error types for all authentication operations

pub mod cache;
pub mod client;
pub mod error;
pub mod jwt;
pub mod token;

// Re-export commonly used types at crate root for convenience
pub use cache::TtlCache;
pub use client::{CachedClientFactory, InstallationClient, InstallationClientProvider};
pub use error::AuthError;
pub use jwt::{AppJwt, JwtSigner, Rs256JwtSigner};
pub use token::{HttpTokenExchanger, InstallationToken, TokenExchanger};

use serde::{Deserialize, Serialize};

/// Identifier of a GitHub App registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppId(u64);

impl AppId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a GitHub App installation.
///
/// An installation is a tenant-scoped grant of the app to a specific account
/// or organization, and is the unit of credential scoping: every installation
/// gets its own access tokens and therefore its own cached client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallationId(u64);

impl InstallationId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstallationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for InstallationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
