//! # Controller Identity
//!
//! Discovers the controller's own service-account name and namespace from the
//! projected token mounted into the pod.
//!
//! The token is a JWT whose claims carry `kubernetes.io.namespace` and
//! `kubernetes.io.serviceaccount.name`. The signature is not verified; the
//! token was handed to us by the kubelet and is only used to learn who we are.

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use std::path::Path;

/// Service-account identity of the running controller
///
/// Discovered once at startup and used when authenticating to Vault via the
/// Kubernetes auth method.
#[derive(Debug, Clone)]
pub struct ControllerIdentity {
    /// Namespace the controller pod runs in
    pub namespace: String,
    /// Name of the controller's service account
    pub service_account: String,
}

impl ControllerIdentity {
    /// Read the projected service-account token and extract the identity claims
    pub fn discover(token_path: &Path) -> Result<Self> {
        let token = std::fs::read_to_string(token_path).with_context(|| {
            format!(
                "failed to read service account token from {}",
                token_path.display()
            )
        })?;
        Self::from_token(token.trim())
    }

    /// Parse the unverified claims segment of a service-account JWT
    pub fn from_token(token: &str) -> Result<Self> {
        let claims_segment = token
            .split('.')
            .nth(1)
            .context("service account token is not a JWT")?;
        let claims_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(claims_segment)
            .context("failed to decode JWT claims segment")?;
        let claims: serde_json::Value =
            serde_json::from_slice(&claims_bytes).context("failed to parse JWT claims")?;

        let kubernetes = claims
            .get("kubernetes.io")
            .context("JWT claims missing kubernetes.io")?;
        let namespace = kubernetes
            .get("namespace")
            .and_then(|v| v.as_str())
            .context("JWT claims missing kubernetes.io.namespace")?
            .to_string();
        let service_account = kubernetes
            .get("serviceaccount")
            .and_then(|sa| sa.get("name"))
            .and_then(|v| v.as_str())
            .context("JWT claims missing kubernetes.io.serviceaccount.name")?
            .to_string();

        Ok(Self {
            namespace,
            service_account,
        })
    }
}
