//! # GithubApp Status
//!
//! Status types for tracking token state.

use serde::{Deserialize, Serialize};

/// Status of the GithubApp resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GithubAppStatus {
    /// Expiry time of the current installation access token (RFC 3339),
    /// absent until a token has been minted at least once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// Last reconcile failure message, empty when healthy
    #[serde(default)]
    pub error: String,
}

impl GithubAppStatus {
    /// Parse `expiresAt` as a UTC timestamp, treating absent or malformed
    /// values as never-minted
    pub fn expires_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.expires_at
            .as_deref()
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_expiry() {
        let status = GithubAppStatus {
            expires_at: Some("2026-01-02T03:04:05Z".to_string()),
            error: String::new(),
        };
        let parsed = status.expires_at_utc().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-01-02T03:04:05+00:00");
    }

    #[test]
    fn malformed_expiry_reads_as_unset() {
        let status = GithubAppStatus {
            expires_at: Some("not-a-timestamp".to_string()),
            error: String::new(),
        };
        assert!(status.expires_at_utc().is_none());
        assert!(GithubAppStatus::default().expires_at_utc().is_none());
    }
}
