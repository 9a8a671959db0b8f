//! # Status Updates
//!
//! Writes the `GithubApp` status subresource with a bounded retry on
//! optimistic-concurrency conflicts. This is the only write path that
//! tolerates conflicts; everything else surfaces the first failure.

use crate::constants::STATUS_UPDATE_MAX_ATTEMPTS;
use crate::controller::predicates::is_own_status_transition;
use crate::controller::reconciler::Reconciler;
use crate::crd::{GithubApp, GithubAppStatus};
use anyhow::{Context, Result};
use kube::api::PostParams;
use kube::{Api, ResourceExt};
use std::time::Duration;
use tracing::{debug, warn};

/// Replace the status subresource, retrying conflicts up to three times
/// with a linear `attempts * 2s` sleep between tries
///
/// The latest object is re-read before every attempt so the write carries a
/// fresh resourceVersion. A 404 means the resource was deleted mid-reconcile
/// and is not an error.
pub async fn update_status(
    reconciler: &Reconciler,
    app: &GithubApp,
    status: GithubAppStatus,
) -> Result<()> {
    let namespace = app.namespace().unwrap_or_default();
    let name = app.name_any();
    let api: Api<GithubApp> = Api::namespaced(reconciler.client.clone(), &namespace);

    let mut attempts = 0u32;
    loop {
        attempts += 1;

        let mut latest = match api.get(&name).await {
            Ok(latest) => latest,
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!("GithubApp {namespace}/{name} deleted during reconcile, skipping status update");
                return Ok(());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to get GithubApp {namespace}/{name}"));
            }
        };

        if latest.status.as_ref() == Some(&status) {
            debug!("status of {namespace}/{name} unchanged, skipping write");
            return Ok(());
        }

        // The transition this write performs is judged against the status of
        // the attempt that wins, not the entry-time snapshot; a conflict
        // retry means a concurrent writer moved the object in between.
        let previous = latest.status.replace(status.clone()).unwrap_or_default();
        let body = serde_json::to_vec(&latest)
            .with_context(|| format!("failed to serialize GithubApp {namespace}/{name}"))?;

        match api.replace_status(&name, &PostParams::default(), body).await {
            Ok(_) => {
                // Only the transitions the event filter recognizes as the
                // controller's own (first expiry set, error cleared) are
                // recorded for suppression; anything else re-triggers a
                // normal reconcile.
                if is_own_status_transition(&previous, &status) {
                    let key = format!("{namespace}/{name}");
                    reconciler.self_writes.record(&key, &status);
                }
                return Ok(());
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                if attempts >= STATUS_UPDATE_MAX_ATTEMPTS {
                    anyhow::bail!(
                        "failed to update status of GithubApp {namespace}/{name}: \
                         conflict persisted after {attempts} attempts"
                    );
                }
                warn!(
                    "status write conflict for {namespace}/{name}, retrying (attempt {attempts})"
                );
                tokio::time::sleep(Duration::from_secs(u64::from(attempts) * 2)).await;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to update status of GithubApp {namespace}/{name}")
                });
            }
        }
    }
}
