//! # Controller Configuration
//!
//! Process-wide settings loaded once at startup from environment variables.
//!
//! The resulting [`ControllerConfig`] is immutable and passed into the
//! reconciler context; nothing reads the environment after startup.

use crate::constants::{
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_EXPIRY_THRESHOLD_SECS, DEFAULT_METRICS_PORT,
    DEFAULT_PRIVATE_KEY_CACHE_PATH, DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH, DEFAULT_WEBHOOK_PORT,
};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment
/// variables. Environment variables are populated from a ConfigMap using
/// `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Idle requeue period between reconciles of a healthy resource
    pub check_interval: Duration,
    /// Renew the token when less than this remains before `status.expiresAt`
    pub expiry_threshold: Duration,
    /// Vault role bound to the controller service account
    pub vault_role: Option<String>,
    /// Audience requested for the service-account JWT fed to Vault
    pub vault_role_audience: Option<String>,
    /// Vault server address
    pub vault_addr: Option<String>,
    /// Optional HTTP proxy for GitHub API calls
    pub github_proxy: Option<String>,
    /// Optional HTTP proxy for Vault calls, exported as the ambient proxy
    /// environment honored by the Vault client
    pub vault_proxy_addr: Option<String>,
    /// Verbose logging
    pub debug_log: bool,
    /// Root directory of the on-disk private-key cache
    pub private_key_cache_path: PathBuf,
    /// Path of the projected service-account token used for identity discovery
    pub service_account_token_path: PathBuf,
    /// HTTP port for metrics and health probes
    pub metrics_port: u16,
    /// HTTP port for the validating admission webhook
    pub webhook_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            expiry_threshold: Duration::from_secs(DEFAULT_EXPIRY_THRESHOLD_SECS),
            vault_role: None,
            vault_role_audience: None,
            vault_addr: None,
            github_proxy: None,
            vault_proxy_addr: None,
            debug_log: false,
            private_key_cache_path: PathBuf::from(DEFAULT_PRIVATE_KEY_CACHE_PATH),
            service_account_token_path: PathBuf::from(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH),
            metrics_port: DEFAULT_METRICS_PORT,
            webhook_port: DEFAULT_WEBHOOK_PORT,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            check_interval: env_duration_or_default(
                "CHECK_INTERVAL",
                Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            ),
            expiry_threshold: env_duration_or_default(
                "EXPIRY_THRESHOLD",
                Duration::from_secs(DEFAULT_EXPIRY_THRESHOLD_SECS),
            ),
            vault_role: env_var_opt("VAULT_ROLE"),
            vault_role_audience: env_var_opt("VAULT_ROLE_AUDIENCE"),
            vault_addr: env_var_opt("VAULT_ADDR"),
            github_proxy: env_var_opt("GITHUB_PROXY"),
            vault_proxy_addr: env_var_opt("VAULT_PROXY_ADDR"),
            debug_log: env_var_or_default_bool("DEBUG_LOG", false),
            private_key_cache_path: PathBuf::from(env_var_or_default_str(
                "PRIVATE_KEY_CACHE_PATH",
                DEFAULT_PRIVATE_KEY_CACHE_PATH,
            )),
            service_account_token_path: PathBuf::from(env_var_or_default_str(
                "SERVICE_ACCOUNT_TOKEN_PATH",
                DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH,
            )),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            webhook_port: env_var_or_default("WEBHOOK_PORT", DEFAULT_WEBHOOK_PORT),
        }
    }
}

/// Parse a Kubernetes duration string into a `std::time::Duration`
///
/// Supports the short form `<number><unit>` with units `s`, `m`, `h`, `d`,
/// e.g. "30s", "5m", "1h".
pub fn parse_kubernetes_duration(duration_str: &str) -> anyhow::Result<Duration> {
    let trimmed = duration_str.trim().to_lowercase();
    if trimmed.is_empty() {
        anyhow::bail!("duration string cannot be empty");
    }

    let duration_regex = Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$")
        .map_err(|e| anyhow::anyhow!("failed to compile regex: {e}"))?;

    let captures = duration_regex.captures(&trimmed).ok_or_else(|| {
        anyhow::anyhow!(
            "invalid duration format '{}', expected <number><unit> (e.g. '30s', '5m', '1h')",
            duration_str.trim()
        )
    })?;

    let number: u64 = captures["number"]
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid duration number in '{trimmed}': {e}"))?;

    let seconds = match &captures["unit"] {
        "s" => number,
        "m" => number * 60,
        "h" => number * 3600,
        "d" => number * 86400,
        unit => anyhow::bail!("unsupported duration unit '{unit}'"),
    };

    Ok(Duration::from_secs(seconds))
}

/// Read a duration environment variable, silently falling back to the default
/// when unset or unparsable
fn env_duration_or_default(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => match parse_kubernetes_duration(&raw) {
            Ok(duration) => duration,
            Err(e) => {
                warn!("ignoring invalid {key}='{raw}': {e}");
                default
            }
        },
        Err(_) => default,
    }
}

/// Read an environment variable, treating empty values as unset
fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
