//! # Rate-Limit Backoff
//!
//! Retry schedule for GitHub endpoints that answer 403/429: the server-sent
//! `Retry-After` is scaled by `2^attempt` and smeared with up to 500ms of
//! jitter. At most five attempts are made before giving up.

use crate::constants::GITHUB_MAX_ATTEMPTS;
use crate::github::GithubError;
use rand::Rng;
use reqwest::header::HeaderMap;
use std::future::Future;
use std::time::Duration;

/// Outcome of a single rate-limited call
pub(crate) enum Attempt<T> {
    /// The call completed; stop retrying
    Done(T),
    /// GitHub rate-limited the call; retry after the given number of seconds
    RetryAfter(u64),
}

/// Drive a rate-limited GitHub call to completion
///
/// `call` is invoked up to [`GITHUB_MAX_ATTEMPTS`] times. Terminal errors
/// propagate immediately; only [`Attempt::RetryAfter`] outcomes consume the
/// retry budget. The sleep between attempts is interruptible by dropping the
/// returned future.
pub(crate) async fn with_rate_limit_retry<T, F, Fut>(mut call: F) -> Result<T, GithubError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>, GithubError>>,
{
    for attempt in 0..GITHUB_MAX_ATTEMPTS {
        match call().await? {
            Attempt::Done(value) => return Ok(value),
            Attempt::RetryAfter(retry_after_secs) => {
                if attempt + 1 == GITHUB_MAX_ATTEMPTS {
                    break;
                }
                tokio::time::sleep(delay_for_attempt(retry_after_secs, attempt)).await;
            }
        }
    }
    Err(GithubError::RateLimitExhausted(GITHUB_MAX_ATTEMPTS))
}

/// Read `Retry-After` as whole seconds, defaulting to 1 on absence or
/// parse failure
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(1)
}

/// Full delay before the next attempt: `retry_after * 2^attempt` plus jitter
pub(crate) fn delay_for_attempt(retry_after_secs: u64, attempt: u32) -> Duration {
    base_delay(retry_after_secs, attempt) + jitter()
}

/// Deterministic part of the schedule, `retry_after * 2^attempt` seconds
fn base_delay(retry_after_secs: u64, attempt: u32) -> Duration {
    let multiplier = 1u64 << attempt.min(63);
    Duration::from_secs(retry_after_secs.saturating_mul(multiplier))
}

/// Uniform jitter of 0-499ms
fn jitter() -> Duration {
    Duration::from_millis(rand::rng().random_range(0..500))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_delay_doubles_per_attempt() {
        assert_eq!(base_delay(2, 0), Duration::from_secs(2));
        assert_eq!(base_delay(2, 1), Duration::from_secs(4));
        assert_eq!(base_delay(2, 2), Duration::from_secs(8));
        assert_eq!(base_delay(2, 4), Duration::from_secs(32));
        assert_eq!(base_delay(1, 0), Duration::from_secs(1));
    }

    #[test]
    fn full_delay_adds_bounded_jitter() {
        for _ in 0..100 {
            let delay = delay_for_attempt(2, 1);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay < Duration::from_secs(4) + Duration::from_millis(500));
        }
    }

    #[test]
    fn retry_after_defaults_to_one_second() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), 1);

        headers.insert(reqwest::header::RETRY_AFTER, "garbage".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), 1);

        headers.insert(reqwest::header::RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), 7);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let mut calls = 0u32;
        let result: Result<(), GithubError> = with_rate_limit_retry(|| {
            calls += 1;
            async { Ok(Attempt::RetryAfter(0)) }
        })
        .await;

        assert!(matches!(result, Err(GithubError::RateLimitExhausted(5))));
        assert_eq!(calls, GITHUB_MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn terminal_errors_short_circuit() {
        let mut calls = 0u32;
        let result: Result<(), GithubError> = with_rate_limit_retry(|| {
            calls += 1;
            async {
                Err(GithubError::UnexpectedStatus(
                    reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                ))
            }
        })
        .await;

        assert!(matches!(result, Err(GithubError::UnexpectedStatus(_))));
        assert_eq!(calls, 1);
    }
}
