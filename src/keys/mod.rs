//! # Key Resolver
//!
//! Produces the RSA private key for a `GithubApp` from one of three sources
//! (Kubernetes Secret, Vault KV-v2, GCP Secret Manager), fronted by an
//! on-disk cache keyed by namespace/name.
//!
//! Sources are stateless; the resolver owns source selection and caching. It
//! never retries — retry is the reconciler's responsibility via requeue.

pub mod cache;
mod gcp;
mod kubernetes;
mod vault;

pub use cache::KeyCache;

use crate::config::ControllerConfig;
use crate::crd::{GithubApp, GithubAppSpec, VaultPrivateKey};
use crate::identity::ControllerIdentity;
use anyhow::{Context, Result};
use gcp::GcpSecretManager;
use kube::ResourceExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

/// Rule enforced at admission time and defensively by the resolver
pub const KEY_SOURCE_EXCLUSIVITY_RULE: &str =
    "exactly one of googlePrivateKeySecret, privateKeySecret, or vaultPrivateKey must be specified";

/// The key source selected by a `GithubApp` spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource<'a> {
    /// Secret in the resource namespace with a raw PEM `privateKey` field
    Kubernetes(&'a str),
    /// Fully qualified GCP Secret Manager resource name
    GoogleSecretManager(&'a str),
    /// Vault KV-v2 entry location
    Vault(&'a VaultPrivateKey),
}

/// Pick the single configured key source, rejecting zero or multiple
pub fn select_key_source(spec: &GithubAppSpec) -> Result<KeySource<'_>> {
    let mut sources = Vec::new();
    if let Some(name) = spec.private_key_secret.as_deref().filter(|s| !s.is_empty()) {
        sources.push(KeySource::Kubernetes(name));
    }
    if let Some(name) = spec
        .google_private_key_secret
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        sources.push(KeySource::GoogleSecretManager(name));
    }
    if let Some(location) = spec.vault_private_key.as_ref() {
        sources.push(KeySource::Vault(location));
    }

    match sources.len() {
        1 => Ok(sources.remove(0)),
        _ => anyhow::bail!("{KEY_SOURCE_EXCLUSIVITY_RULE}"),
    }
}

/// A resolved private key and the cache entry backing it
pub struct ResolvedKey {
    /// PEM bytes, wiped from memory on drop
    pub pem: Zeroizing<Vec<u8>>,
    /// On-disk cache entry the key was read from or written to
    pub cache_path: PathBuf,
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("cache_path", &self.cache_path)
            .finish_non_exhaustive()
    }
}

/// Resolves private keys for `GithubApp`s, cache first
#[derive(Clone)]
pub struct KeyResolver {
    client: kube::Client,
    gcp: GcpSecretManager,
    cache: KeyCache,
    config: Arc<ControllerConfig>,
    identity: Option<ControllerIdentity>,
}

impl std::fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResolver")
            .field("cache", &self.cache)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl KeyResolver {
    pub fn new(
        client: kube::Client,
        http: reqwest::Client,
        config: Arc<ControllerConfig>,
        identity: Option<ControllerIdentity>,
    ) -> Self {
        let cache = KeyCache::new(config.private_key_cache_path.clone());
        Self {
            client,
            gcp: GcpSecretManager::new(http),
            cache,
            config,
            identity,
        }
    }

    /// Resolve the private key for a `GithubApp`
    ///
    /// Cache hits short-circuit all remote sources. Source errors are
    /// returned verbatim with a context prefix naming the source.
    pub async fn resolve(&self, app: &GithubApp) -> Result<ResolvedKey> {
        let namespace = app.namespace().unwrap_or_default();
        let name = app.name_any();
        let cache_path = self.cache.entry_path(&namespace, &name);

        if let Some(pem) = self.cache.read(&namespace, &name)? {
            debug!(
                "using cached private key for {namespace}/{name} at {}",
                cache_path.display()
            );
            return Ok(ResolvedKey { pem, cache_path });
        }

        let pem = match select_key_source(&app.spec)? {
            KeySource::Kubernetes(secret_name) => {
                kubernetes::fetch(&self.client, &namespace, secret_name)
                    .await
                    .context("failed to get private key from kubernetes secret")?
            }
            KeySource::GoogleSecretManager(resource_name) => self
                .gcp
                .fetch(resource_name)
                .await
                .context("failed to get private key from google secret manager")?,
            KeySource::Vault(location) => {
                vault::fetch(&self.client, &self.config, self.identity.as_ref(), location)
                    .await
                    .context("failed to get private key from vault")?
            }
        };

        if pem.is_empty() {
            anyhow::bail!("private key for {namespace}/{name} is empty");
        }

        let cache_path = self.cache.write(&namespace, &name, &pem)?;
        Ok(ResolvedKey { pem, cache_path })
    }

    /// Drop the cache entry so the next resolve re-fetches from the source
    pub fn invalidate(&self, namespace: &str, name: &str) -> Result<()> {
        self.cache.remove(namespace, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(
        k8s: Option<&str>,
        gcp: Option<&str>,
        vault: Option<VaultPrivateKey>,
    ) -> GithubAppSpec {
        GithubAppSpec {
            app_id: 857_468,
            install_id: 48_531_286,
            access_token_secret: "github-app-access-token-857468".to_string(),
            private_key_secret: k8s.map(String::from),
            google_private_key_secret: gcp.map(String::from),
            vault_private_key: vault,
            rollout_deployment: None,
        }
    }

    fn vault_location() -> VaultPrivateKey {
        VaultPrivateKey {
            mount_path: "secret".to_string(),
            secret_path: "github-apps/ci".to_string(),
            secret_key: "privateKey".to_string(),
        }
    }

    #[test]
    fn selects_each_single_source() {
        assert_eq!(
            select_key_source(&spec(Some("gh-key"), None, None)).unwrap(),
            KeySource::Kubernetes("gh-key")
        );
        assert_eq!(
            select_key_source(&spec(None, Some("projects/p/secrets/s/versions/1"), None)).unwrap(),
            KeySource::GoogleSecretManager("projects/p/secrets/s/versions/1")
        );
        let location = vault_location();
        assert_eq!(
            select_key_source(&spec(None, None, Some(location.clone()))).unwrap(),
            KeySource::Vault(&location)
        );
    }

    #[test]
    fn rejects_zero_sources() {
        let err = select_key_source(&spec(None, None, None)).unwrap_err();
        assert_eq!(err.to_string(), KEY_SOURCE_EXCLUSIVITY_RULE);
    }

    #[test]
    fn rejects_multiple_sources() {
        let err = select_key_source(&spec(
            Some("gh-key"),
            Some("projects/p/secrets/s/versions/1"),
            None,
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), KEY_SOURCE_EXCLUSIVITY_RULE);

        let err =
            select_key_source(&spec(Some("gh-key"), None, Some(vault_location()))).unwrap_err();
        assert_eq!(err.to_string(), KEY_SOURCE_EXCLUSIVITY_RULE);
    }

    #[test]
    fn empty_strings_read_as_unset() {
        assert_eq!(
            select_key_source(&spec(Some(""), Some("projects/p/secrets/s/versions/1"), None))
                .unwrap(),
            KeySource::GoogleSecretManager("projects/p/secrets/s/versions/1")
        );
        assert!(select_key_source(&spec(Some(""), Some(""), None)).is_err());
    }
}
