//! Error types for GitHub App authentication.

use thiserror::Error;

/// Errors raised while authenticating as a GitHub App or minting
/// installation-scoped credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The configured private key could not be parsed as an RSA PEM key.
    #[error("Invalid App private key: {message}")]
    InvalidPrivateKey { message: String },

    /// Signing the App JWT failed.
    #[error("JWT signing failed: {message}")]
    JwtSigning { message: String },

    /// GitHub rejected the installation token exchange.
    #[error("Installation token exchange failed with status {status}: {message}")]
    TokenExchange { status: u16, message: String },

    /// GitHub returned a response body that could not be decoded.
    #[error("Unexpected response from GitHub: {message}")]
    UnexpectedResponse { message: String },

    /// Transport-level failure talking to GitHub.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}
