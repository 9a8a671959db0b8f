//! # Spec Validation
//!
//! Key-source exclusivity rule for `GithubApp` specs. Enforced at admission
//! time by the webhook and defensively by the reconciler, since the webhook
//! may be disabled in environments that enforce the rule with external
//! policy.

use crate::crd::GithubAppSpec;
use crate::keys::select_key_source;

/// Check that exactly one private-key source is configured
///
/// Returns the rule text as the error message so the webhook can surface it
/// verbatim to the API client.
pub fn validate_key_sources(spec: &GithubAppSpec) -> Result<(), String> {
    select_key_source(spec)
        .map(|_| ())
        .map_err(|e| e.to_string())
}
