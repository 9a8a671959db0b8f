//! # Kubernetes Secret Key Source
//!
//! Reads the app private key from a Secret in the `GithubApp`'s namespace.
//! The `privateKey` field holds raw PEM bytes, not base64-on-base64.

use crate::constants::PRIVATE_KEY_FIELD;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use zeroize::Zeroizing;

pub(crate) async fn fetch(
    client: &kube::Client,
    namespace: &str,
    secret_name: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = secrets
        .get(secret_name)
        .await
        .with_context(|| format!("failed to get Secret {namespace}/{secret_name}"))?;

    let pem = secret
        .data
        .as_ref()
        .and_then(|data| data.get(PRIVATE_KEY_FIELD))
        .with_context(|| format!("{PRIVATE_KEY_FIELD} not found in Secret"))?;

    Ok(Zeroizing::new(pem.0.clone()))
}
