//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Field manager / event reporter name used for all API writes
pub const FIELD_MANAGER: &str = "github-app-controller";

/// Finalizer added to `GithubApp` resources so teardown can clean up
/// the access-token Secret and the on-disk key cache entry
pub const FINALIZER: &str = "githubapp.samir.io/finalizer";

/// GitHub REST API base URL
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Accept header for GitHub App endpoints
pub const GITHUB_ACCEPT_HEADER: &str = "application/vnd.github+json";

/// Maximum attempts for rate-limited GitHub calls (attempts indexed 0..4)
pub const GITHUB_MAX_ATTEMPTS: u32 = 5;

/// App JWT lifetime in seconds (GitHub caps app JWTs at 10 minutes)
pub const APP_JWT_TTL_SECS: u64 = 600;

/// GCP Secret Manager REST API base URL
pub const GCP_SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";

/// GCE metadata server token endpoint (Workload Identity)
pub const GCP_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Vault Kubernetes auth method mount path
pub const VAULT_AUTH_MOUNT: &str = "kubernetes";

/// TTL requested for the service-account JWT fed to Vault (seconds)
pub const VAULT_TOKEN_TTL_SECS: i64 = 600;

/// Key of the access token inside the managed Secret
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Key of the username inside the managed Secret
pub const ACCESS_TOKEN_USERNAME_KEY: &str = "username";

/// Fixed username value stored alongside the access token
pub const ACCESS_TOKEN_USERNAME: &str = "not-used";

/// Field holding the PEM private key inside a user-provided Secret
pub const PRIVATE_KEY_FIELD: &str = "privateKey";

/// Pod-template label rewritten to force a Deployment rolling upgrade
pub const ROLLOUT_RESTART_LABEL: &str = "ghApplastUpdateTime";

/// Default idle requeue period (`CHECK_INTERVAL`)
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Default pre-expiry renewal window (`EXPIRY_THRESHOLD`)
pub const DEFAULT_EXPIRY_THRESHOLD_SECS: u64 = 900;

/// Default private-key cache root (`PRIVATE_KEY_CACHE_PATH`)
pub const DEFAULT_PRIVATE_KEY_CACHE_PATH: &str = "/var/run/github-app-secrets/";

/// Default projected service-account token path
pub const DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default admission webhook port
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;

/// Admission webhook path for `GithubApp` validation
pub const WEBHOOK_PATH: &str = "/validate-githubapp-samir-io-v1-githubapp";

/// Requeue interval after a reconciliation error (seconds)
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 60;

/// Maximum attempts for status writes hitting an optimistic-concurrency conflict
pub const STATUS_UPDATE_MAX_ATTEMPTS: u32 = 3;
