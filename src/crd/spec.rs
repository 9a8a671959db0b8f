//! # GithubApp Spec
//!
//! Main CRD specification types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// GithubApp Custom Resource Definition
///
/// Declares a GitHub App installation whose access token the controller
/// mints, stores in a namespaced Secret and renews before expiry.
///
/// # Example
///
/// ```yaml
/// apiVersion: githubapp.samir.io/v1
/// kind: GithubApp
/// metadata:
///   name: my-github-app
///   namespace: default
/// spec:
///   appId: 857468
///   installId: 48531286
///   accessTokenSecret: github-app-access-token-857468
///   privateKeySecret: gh-app-key
///   rolloutDeployment:
///     labels:
///       app: my-service
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "GithubApp",
    group = "githubapp.samir.io",
    version = "v1",
    namespaced,
    status = "crate::crd::GithubAppStatus",
    printcolumn = r#"{"name":"App ID", "type":"integer", "jsonPath":".spec.appId"}"#,
    printcolumn = r#"{"name":"Access Token Secret", "type":"string", "jsonPath":".spec.accessTokenSecret"}"#,
    printcolumn = r#"{"name":"Install ID", "type":"integer", "jsonPath":".spec.installId"}"#,
    printcolumn = r#"{"name":"Expires At", "type":"string", "jsonPath":".status.expiresAt"}"#,
    printcolumn = r#"{"name":"Error", "type":"string", "jsonPath":".status.error"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GithubAppSpec {
    /// GitHub App numeric identifier
    pub app_id: i64,
    /// Installation identifier under the app
    pub install_id: i64,
    /// Name of the managed Secret holding the installation access token
    pub access_token_secret: String,
    /// Name of a Secret in the same namespace with field `privateKey`
    /// holding a PEM-encoded RSA key
    ///
    /// Exactly one of `privateKeySecret`, `googlePrivateKeySecret` and
    /// `vaultPrivateKey` must be set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_secret: Option<String>,
    /// Fully qualified GCP Secret Manager resource name whose payload is a
    /// base64-encoded PEM, e.g.
    /// `projects/my-project/secrets/gh-app-key/versions/latest`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_private_key_secret: Option<String>,
    /// Location of a Vault KV-v2 entry whose value is a base64-encoded PEM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_private_key: Option<VaultPrivateKey>,
    /// Deployments to restart when a new token is issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_deployment: Option<RolloutDeployment>,
}

/// Vault KV-v2 location of the app private key
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultPrivateKey {
    /// KV-v2 mount path, e.g. "secret"
    pub mount_path: String,
    /// Path of the entry under the mount
    pub secret_path: String,
    /// Field inside the entry holding the base64-encoded PEM
    pub secret_key: String,
}

/// Rollout configuration for Deployments consuming the access token
///
/// Each label key/value pair independently selects Deployments in the
/// resource namespace; matching Deployments are restarted whenever the
/// token is renewed.
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolloutDeployment {
    /// Equality label selectors, applied one pair at a time
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}
