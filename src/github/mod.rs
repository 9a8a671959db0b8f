//! # GitHub API Client
//!
//! Minimal client for the two GitHub endpoints the controller needs:
//! exchanging a signed app JWT for an installation access token, and probing
//! an existing token against the rate-limit endpoint.
//!
//! Rate-limited responses (403/429) are retried with exponential backoff and
//! jitter, bounded to five attempts; the schedule lives in [`backoff`] and is
//! shared by both operations.

pub mod backoff;
mod minter;
mod probe;

pub use minter::InstallationToken;

use crate::constants::GITHUB_API_URL;
use thiserror::Error;

/// Errors surfaced by GitHub API operations
#[derive(Debug, Error)]
pub enum GithubError {
    /// The PEM bytes could not be parsed as an RSA private key
    #[error("failed to parse private key: {0}")]
    InvalidPrivateKey(#[source] jsonwebtoken::errors::Error),

    /// Signing the app JWT failed
    #[error("failed to sign app JWT: {0}")]
    Jwt(#[source] jsonwebtoken::errors::Error),

    /// Transport-level failure talking to GitHub
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// GitHub answered with a status the controller does not handle
    #[error("GitHub returned unexpected status {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    /// GitHub kept rate-limiting for the whole retry budget
    #[error("GitHub rate limit not lifted after {0} attempts")]
    RateLimitExhausted(u32),
}

/// Shared GitHub API client
///
/// One instance per process; the underlying `reqwest::Client` pools
/// connections and is safe to share across reconciles.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GithubClient {
    /// Create a client against the public GitHub API
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, GITHUB_API_URL)
    }

    /// Create a client against a custom base URL (mock servers in tests)
    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}
