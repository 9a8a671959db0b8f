//! # Token Probe
//!
//! Checks whether a stored installation token is still usable by querying
//! GitHub's rate-limit endpoint. Probing is advisory: any failure merely
//! reports the token as invalid, which triggers a renewal upstream.

use crate::constants::ACCESS_TOKEN_USERNAME;
use crate::github::backoff::{parse_retry_after, with_rate_limit_retry, Attempt};
use crate::github::{GithubClient, GithubError};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitCore,
}

#[derive(Debug, Deserialize)]
struct RateLimitCore {
    remaining: i64,
}

impl GithubClient {
    /// Report whether the stored token is still valid
    ///
    /// A tampered username short-circuits to invalid without any HTTP call.
    /// Rate-limited responses retry on the shared schedule; exhaustion or any
    /// other failure reads as invalid rather than an error.
    pub async fn probe(&self, username: &str, token: &str) -> bool {
        if username != ACCESS_TOKEN_USERNAME {
            debug!("access token secret username was modified, treating token as invalid");
            return false;
        }

        let url = format!("{}/rate_limit", self.base_url);
        let result = with_rate_limit_retry(|| {
            let http = &self.http;
            let url = &url;
            let token = token;
            async move {
                let response = http
                    .get(url)
                    .header(reqwest::header::AUTHORIZATION, format!("token {token}"))
                    .send()
                    .await?;

                match response.status() {
                    StatusCode::OK => {
                        let body: RateLimitResponse = response.json().await?;
                        Ok(Attempt::Done(body.resources.core.remaining > 0))
                    }
                    StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                        Ok(Attempt::RetryAfter(parse_retry_after(response.headers())))
                    }
                    status => Err(GithubError::UnexpectedStatus(status)),
                }
            }
        })
        .await;

        match result {
            Ok(valid) => valid,
            Err(e) => {
                debug!("token probe failed, treating token as invalid: {e}");
                false
            }
        }
    }
}
