//! # Access-Token Secret Management
//!
//! Write semantics for the managed Secret: exactly the fields `token` and
//! `username`, owner-referenced by the `GithubApp`, fully rewritten on every
//! renewal so stray fields never survive.

use crate::constants::{ACCESS_TOKEN_KEY, ACCESS_TOKEN_USERNAME, ACCESS_TOKEN_USERNAME_KEY};
use crate::controller::reconciler::Reconciler;
use crate::crd::GithubApp;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DeleteParams, ListParams, ObjectMeta, PostParams};
use kube::runtime::events::EventType;
use kube::{Api, Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::info;

/// Create or overwrite the access-token Secret for a `GithubApp`
///
/// A full replace (not a patch) is used so any fields added out of band are
/// dropped and the owner reference is refreshed along the way.
pub async fn upsert_access_token_secret(
    reconciler: &Reconciler,
    app: &GithubApp,
    token: &str,
) -> Result<()> {
    let namespace = app.namespace().unwrap_or_default();
    let secret_name = app.spec.access_token_secret.clone();
    let api: Api<Secret> = Api::namespaced(reconciler.client.clone(), &namespace);

    let owner_ref = app
        .controller_owner_ref(&())
        .context("GithubApp is missing metadata for an owner reference")?;

    let mut string_data = BTreeMap::new();
    string_data.insert(ACCESS_TOKEN_KEY.to_string(), token.to_string());
    string_data.insert(
        ACCESS_TOKEN_USERNAME_KEY.to_string(),
        ACCESS_TOKEN_USERNAME.to_string(),
    );

    let mut desired = Secret {
        metadata: ObjectMeta {
            name: Some(secret_name.clone()),
            namespace: Some(namespace.clone()),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        string_data: Some(string_data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    };

    match api.get(&secret_name).await {
        Ok(existing) => {
            desired.metadata.resource_version = existing.metadata.resource_version;
            api.replace(&secret_name, &PostParams::default(), &desired)
                .await
                .with_context(|| {
                    format!("failed to update access token secret {namespace}/{secret_name}")
                })?;
            info!("updated access token secret {namespace}/{secret_name}");
            reconciler
                .publish_event(
                    app,
                    EventType::Normal,
                    "Updated",
                    "Updating",
                    format!("Updated access token secret {secret_name}"),
                )
                .await;
        }
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
            api.create(&PostParams::default(), &desired)
                .await
                .with_context(|| {
                    format!("failed to create access token secret {namespace}/{secret_name}")
                })?;
            info!("created access token secret {namespace}/{secret_name}");
            reconciler
                .publish_event(
                    app,
                    EventType::Normal,
                    "Created",
                    "Creating",
                    format!("Created access token secret {secret_name}"),
                )
                .await;
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("failed to get access token secret {namespace}/{secret_name}")
            });
        }
    }

    Ok(())
}

/// Delete every Secret in the namespace owner-referenced by a `GithubApp`
/// of the given name, used during teardown
pub async fn delete_owned_secrets(
    reconciler: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<()> {
    let api: Api<Secret> = Api::namespaced(reconciler.client.clone(), namespace);
    let secrets = api
        .list(&ListParams::default())
        .await
        .with_context(|| format!("failed to list secrets in {namespace}"))?;

    let owner_kind = GithubApp::kind(&());
    for secret in secrets {
        let owned = secret
            .metadata
            .owner_references
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|owner| owner.kind == owner_kind.as_ref() && owner.name == name);
        if !owned {
            continue;
        }

        let secret_name = secret.name_any();
        match api.delete(&secret_name, &DeleteParams::default()).await {
            Ok(_) => info!("deleted access token secret {namespace}/{secret_name}"),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to delete secret {namespace}/{secret_name}"));
            }
        }
    }

    Ok(())
}

/// True iff the Secret carries any key besides `token` and `username`
///
/// Callers treat stray fields as a tampered secret and regenerate it.
pub fn has_stray_fields(secret: &Secret) -> bool {
    secret
        .data
        .as_ref()
        .map(|data| {
            data.keys()
                .any(|key| key != ACCESS_TOKEN_KEY && key != ACCESS_TOKEN_USERNAME_KEY)
        })
        .unwrap_or(false)
}
