//! # Vault Key Source
//!
//! Fetches the app private key from a HashiCorp Vault KV-v2 entry.
//!
//! Authentication uses the Kubernetes auth method: the controller mints a
//! short-lived audience-bound JWT for its own service account through the
//! TokenRequest API and trades it for a Vault token. The JWT is never
//! persisted and never reused across reconciles.

use crate::config::ControllerConfig;
use crate::constants::{VAULT_AUTH_MOUNT, VAULT_TOKEN_TTL_SECS};
use crate::crd::VaultPrivateKey;
use crate::identity::ControllerIdentity;
use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::PostParams;
use kube::Api;
use std::collections::HashMap;
use vaultrs::client::{Client as _, VaultClient, VaultClientSettingsBuilder};
use vaultrs::kv2;
use zeroize::Zeroizing;

pub(crate) async fn fetch(
    kube_client: &kube::Client,
    config: &ControllerConfig,
    identity: Option<&ControllerIdentity>,
    location: &VaultPrivateKey,
) -> Result<Zeroizing<Vec<u8>>> {
    let addr = config
        .vault_addr
        .as_deref()
        .context("VAULT_ADDR is not set")?;
    let role = config
        .vault_role
        .as_deref()
        .context("VAULT_ROLE is not set")?;
    let audience = config
        .vault_role_audience
        .as_deref()
        .context("VAULT_ROLE_AUDIENCE is not set")?;
    let identity =
        identity.context("controller identity unknown, cannot authenticate to vault")?;

    // The settings builder panics on an unparsable address; validate first
    // so a misconfigured VAULT_ADDR surfaces as a per-object error
    reqwest::Url::parse(addr).with_context(|| format!("invalid VAULT_ADDR '{addr}'"))?;

    let jwt = request_service_account_token(kube_client, identity, audience).await?;

    let settings = VaultClientSettingsBuilder::default()
        .address(addr)
        .build()
        .context("failed to build vault client settings")?;
    let mut vault = VaultClient::new(settings).context("failed to create vault client")?;

    let auth = vaultrs::auth::kubernetes::login(&vault, VAULT_AUTH_MOUNT, role, &jwt)
        .await
        .context("vault kubernetes login failed")?;
    vault.set_token(&auth.client_token);

    let entry: HashMap<String, serde_json::Value> =
        kv2::read(&vault, &location.mount_path, &location.secret_path)
            .await
            .with_context(|| {
                format!(
                    "failed to read vault secret {}/{}",
                    location.mount_path, location.secret_path
                )
            })?;

    let value = entry
        .get(&location.secret_key)
        .and_then(|v| v.as_str())
        .with_context(|| format!("{} not found in vault secret", location.secret_key))?;

    let pem = general_purpose::STANDARD
        .decode(value.trim())
        .context("failed to base64 decode vault secret value")?;

    Ok(Zeroizing::new(pem))
}

/// Mint a short-lived audience-bound JWT for the controller service account
async fn request_service_account_token(
    client: &kube::Client,
    identity: &ControllerIdentity,
    audience: &str,
) -> Result<String> {
    let api: Api<ServiceAccount> = Api::namespaced(client.clone(), &identity.namespace);
    let request = TokenRequest {
        spec: TokenRequestSpec {
            audiences: vec![audience.to_string()],
            expiration_seconds: Some(VAULT_TOKEN_TTL_SECS),
            ..Default::default()
        },
        ..Default::default()
    };

    let response = api
        .create_token_request(&identity.service_account, &PostParams::default(), &request)
        .await
        .with_context(|| {
            format!(
                "TokenRequest for {}/{} failed",
                identity.namespace, identity.service_account
            )
        })?;

    response
        .status
        .map(|status| status.token)
        .filter(|token| !token.is_empty())
        .context("TokenRequest returned no token")
}
