//! # Token Minter
//!
//! Signs a short-lived RS256 app JWT and exchanges it with the GitHub App
//! installation API for an installation access token.

use crate::constants::{APP_JWT_TTL_SECS, GITHUB_ACCEPT_HEADER};
use crate::github::backoff::{parse_retry_after, with_rate_limit_retry, Attempt};
use crate::github::{GithubClient, GithubError};
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Installation access token as returned by GitHub
#[derive(Debug, Clone)]
pub struct InstallationToken {
    /// Opaque bearer token, valid for up to one hour
    pub token: String,
    /// Expiry time reported by GitHub
    pub expires_at: DateTime<Utc>,
}

/// Claims of the app JWT exchanged for an installation token
#[derive(Debug, Serialize)]
struct AppJwtClaims {
    /// Issued-at (now)
    iat: u64,
    /// Expiry (10 minutes from now, the GitHub maximum)
    exp: u64,
    /// App identifier, as a string per the GitHub App contract
    iss: String,
}

#[derive(Debug, Deserialize)]
struct RawInstallationToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl GithubClient {
    /// Exchange the app's RSA private key for an installation access token
    ///
    /// Rate-limited responses are retried per the shared schedule; any other
    /// non-201 answer is a terminal error carrying the status code.
    pub async fn mint(
        &self,
        app_id: i64,
        install_id: i64,
        pem: &[u8],
    ) -> Result<InstallationToken, GithubError> {
        let key = EncodingKey::from_rsa_pem(pem).map_err(GithubError::InvalidPrivateKey)?;
        let url = format!(
            "{}/app/installations/{install_id}/access_tokens",
            self.base_url
        );

        with_rate_limit_retry(|| {
            let http = &self.http;
            let key = &key;
            let url = &url;
            async move {
                // Re-sign per attempt so iat/exp stay fresh across backoff sleeps
                let jwt = sign_app_jwt(app_id, key)?;
                let response = http
                    .post(url)
                    .bearer_auth(jwt)
                    .header(reqwest::header::ACCEPT, GITHUB_ACCEPT_HEADER)
                    .send()
                    .await?;

                match response.status() {
                    StatusCode::CREATED => {
                        let raw: RawInstallationToken = response.json().await?;
                        Ok(Attempt::Done(InstallationToken {
                            token: raw.token,
                            expires_at: raw.expires_at,
                        }))
                    }
                    StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                        Ok(Attempt::RetryAfter(parse_retry_after(response.headers())))
                    }
                    status => Err(GithubError::UnexpectedStatus(status)),
                }
            }
        })
        .await
    }
}

fn sign_app_jwt(app_id: i64, key: &EncodingKey) -> Result<String, GithubError> {
    let now = Utc::now().timestamp().max(0) as u64;
    let claims = AppJwtClaims {
        iat: now,
        exp: now + APP_JWT_TTL_SECS,
        iss: app_id.to_string(),
    };
    encode(&Header::new(Algorithm::RS256), &claims, key).map_err(GithubError::Jwt)
}
