//! # Deployment Rollout Trigger
//!
//! Forces rolling restarts of Deployments selected by the resource's rollout
//! labels after a token renewal, so pods pick up fresh credentials.
//!
//! The pod-template label `ghApplastUpdateTime` is rewritten with the current
//! timestamp; the resulting pod-template-hash change makes the Deployment
//! controller perform a rolling upgrade.

use crate::constants::ROLLOUT_RESTART_LABEL;
use crate::controller::reconciler::Reconciler;
use crate::crd::GithubApp;
use anyhow::{Context, Result};
use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{ListParams, Patch, PatchParams};
use kube::runtime::events::EventType;
use kube::{Api, ResourceExt};
use tracing::info;

/// Restart Deployments matching the resource's rollout labels
///
/// Each label key/value pair is applied independently as an equality
/// selector; a Deployment matching several pairs is patched several times,
/// which is idempotent at the pod-template-hash level because the timestamp
/// is monotonically rewritten. The first failure aborts with context.
pub async fn rollout_deployments(reconciler: &Reconciler, app: &GithubApp) -> Result<()> {
    let labels = match app.spec.rollout_deployment.as_ref() {
        Some(rollout) if !rollout.labels.is_empty() => &rollout.labels,
        _ => return Ok(()),
    };

    let namespace = app.namespace().unwrap_or_default();
    let api: Api<Deployment> = Api::namespaced(reconciler.client.clone(), &namespace);
    let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();

    for (key, value) in labels {
        let selector = format!("{key}={value}");
        let deployments = api
            .list(&ListParams::default().labels(&selector))
            .await
            .with_context(|| format!("failed to list deployments matching {selector}"))?;

        for deployment in deployments {
            let deployment_name = deployment.name_any();
            let patch = serde_json::json!({
                "spec": {
                    "template": {
                        "metadata": {
                            "labels": { ROLLOUT_RESTART_LABEL: stamp }
                        }
                    }
                }
            });

            api.patch(
                &deployment_name,
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
            .with_context(|| {
                format!("failed to patch deployment {namespace}/{deployment_name} for rollout")
            })?;

            info!("triggered rolling upgrade of deployment {namespace}/{deployment_name}");
            crate::observability::metrics::increment_rollouts_triggered();
            reconciler
                .publish_event(
                    app,
                    EventType::Normal,
                    "Updated",
                    "Updating",
                    format!("Restarted deployment {deployment_name}"),
                )
                .await;
        }
    }

    Ok(())
}
