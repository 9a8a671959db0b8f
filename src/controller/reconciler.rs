//! # Reconciler
//!
//! Core reconciliation logic for `GithubApp` resources.
//!
//! Each reconcile inspects the resource and its access-token Secret and
//! decides whether the installation token must be minted, refreshed or left
//! alone:
//!
//! 1. Gone or terminating resources get their owned Secrets and cached key
//!    deleted.
//! 2. A valid, unexpired token outside the expiry threshold idles until the
//!    next periodic requeue.
//! 3. Everything else mints: resolve the private key, exchange it with
//!    GitHub, write the access-token Secret, restart selected Deployments,
//!    record the new expiry in status.
//!
//! A process-wide mutex serializes reconciles across all resources; this
//! keeps on-disk key-cache writers single-threaded and amortizes HTTP client
//! contention.

use crate::config::ControllerConfig;
use crate::constants::{DEFAULT_ERROR_REQUEUE_SECS, FIELD_MANAGER, FINALIZER};
use crate::controller::predicates::SelfWriteTracker;
use crate::controller::{rollout, secrets, status};
use crate::crd::{GithubApp, GithubAppStatus};
use crate::github::GithubClient;
use crate::keys::KeyResolver;
use crate::observability::metrics;
use crate::server::ControllerHealth;
use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Api, Client, Resource, ResourceExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] anyhow::Error),
}

/// What the observed state demands of the token
enum TokenState {
    /// Token exists, probes valid and is outside the expiry threshold
    Fresh,
    /// A new token must be minted, with the reason for logging
    NeedsMint(&'static str),
}

/// Why the mint flow failed, so the right warning event is emitted
enum MintError {
    /// Key resolution, token exchange or the Secret write failed
    Renewal(anyhow::Error),
    /// The Secret was written but a Deployment rollout failed
    Rollout(anyhow::Error),
}

/// Shared reconciler context
pub struct Reconciler {
    pub(crate) client: Client,
    pub(crate) config: Arc<ControllerConfig>,
    pub(crate) github: GithubClient,
    pub(crate) keys: KeyResolver,
    pub(crate) self_writes: SelfWriteTracker,
    health: Arc<ControllerHealth>,
    recorder: Recorder,
    reconcile_lock: tokio::sync::Mutex<()>,
}

impl Reconciler {
    pub fn new(
        client: Client,
        config: Arc<ControllerConfig>,
        github: GithubClient,
        keys: KeyResolver,
        health: Arc<ControllerHealth>,
    ) -> Self {
        let reporter = Reporter {
            controller: FIELD_MANAGER.to_string(),
            instance: std::env::var("HOSTNAME").ok(),
        };
        let recorder = Recorder::new(client.clone(), reporter);
        Self {
            client,
            config,
            github,
            keys,
            self_writes: SelfWriteTracker::default(),
            health,
            recorder,
            reconcile_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Emit a Kubernetes event for a `GithubApp`; event failures are logged
    /// and never fail the reconcile
    pub(crate) async fn publish_event(
        &self,
        app: &GithubApp,
        type_: EventType,
        reason: &str,
        action: &str,
        note: String,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, &app.object_ref(&())).await {
            warn!("failed to publish {reason} event: {e}");
        }
    }

    pub async fn reconcile(
        app: Arc<GithubApp>,
        ctx: Arc<Reconciler>,
    ) -> Result<Action, ReconcilerError> {
        // Serialize across all resources, not just per key
        let _serialized = ctx.reconcile_lock.lock().await;
        let start = Instant::now();

        let namespace = app.namespace().unwrap_or_default();
        let name = app.name_any();
        let key = format!("{namespace}/{name}");

        metrics::increment_reconciliations();
        ctx.health.record_reconcile();

        // Decide against the latest object, not the informer cache
        let api: Api<GithubApp> = Api::namespaced(ctx.client.clone(), &namespace);
        let app = match api.get(&name).await {
            Ok(latest) => Arc::new(latest),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                info!("GithubApp {key} is gone, cleaning up");
                ctx.teardown(&namespace, &name).await?;
                return Ok(Action::await_change());
            }
            Err(e) => {
                return Err(anyhow::Error::from(e)
                    .context(format!("failed to get GithubApp {key}"))
                    .into());
            }
        };

        if app.metadata.deletion_timestamp.is_some() {
            info!("GithubApp {key} is terminating, cleaning up");
            ctx.teardown(&namespace, &name).await?;
            remove_finalizer(&api, &app, &name).await?;
            return Ok(Action::await_change());
        }

        ensure_finalizer(&api, &app, &name).await?;

        if ctx.self_writes.consume_if_match(&key, app.status.as_ref()) {
            debug!("skipping reconcile of {key} triggered by own status write");
            return Ok(Action::requeue(ctx.config.check_interval));
        }

        let action = match ctx.assess(&app, &namespace).await {
            TokenState::Fresh => {
                let recorded_error = app
                    .status
                    .as_ref()
                    .map(|s| s.error.as_str())
                    .unwrap_or_default();
                if !recorded_error.is_empty() {
                    let cleared = GithubAppStatus {
                        expires_at: app.status.as_ref().and_then(|s| s.expires_at.clone()),
                        error: String::new(),
                    };
                    status::update_status(&ctx, &app, cleared).await?;
                }
                debug!("token for {key} is valid, requeueing");
                Action::requeue(ctx.config.check_interval)
            }
            TokenState::NeedsMint(reason) => {
                info!("renewing token for {key}: {reason}");
                match ctx.mint_and_distribute(&app, &namespace, &name).await {
                    Ok(expires_at) => {
                        let renewed = GithubAppStatus {
                            expires_at: Some(expires_at.to_rfc3339()),
                            error: String::new(),
                        };
                        status::update_status(&ctx, &app, renewed).await?;
                        metrics::increment_tokens_minted();
                        info!("renewed token for {key}, expires at {expires_at}");
                        Action::requeue(ctx.config.check_interval)
                    }
                    Err(mint_err) => {
                        let (reason, action_word, err) = match mint_err {
                            MintError::Renewal(e) => ("FailedRenewal", "Renewing", e),
                            MintError::Rollout(e) => ("FailedDeploymentUpgrade", "Updating", e),
                        };
                        let message = format!("{err:#}");
                        error!("failed to renew token for {key}: {message}");
                        ctx.publish_event(
                            &app,
                            EventType::Warning,
                            reason,
                            action_word,
                            message.clone(),
                        )
                        .await;

                        let failed = GithubAppStatus {
                            expires_at: app.status.as_ref().and_then(|s| s.expires_at.clone()),
                            error: message,
                        };
                        if let Err(status_err) = status::update_status(&ctx, &app, failed).await {
                            warn!("failed to record error on {key}: {status_err:#}");
                        }

                        return Err(ReconcilerError::ReconciliationFailed(err));
                    }
                }
            }
        };

        metrics::observe_reconcile_duration(start.elapsed().as_secs_f64());
        Ok(action)
    }

    pub fn error_policy(app: Arc<GithubApp>, error: &ReconcilerError, _ctx: Arc<Reconciler>) -> Action {
        error!("reconciliation error for {}: {error}", app.name_any());
        metrics::increment_reconciliation_errors();
        Action::requeue(Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS))
    }

    /// Decide whether the current token can be kept
    async fn assess(&self, app: &GithubApp, namespace: &str) -> TokenState {
        let expires_at = match app.status.as_ref().and_then(GithubAppStatus::expires_at_utc) {
            Some(expires_at) => expires_at,
            None => return TokenState::NeedsMint("no token has been minted yet"),
        };

        let now = Utc::now();
        if expires_at <= now {
            return TokenState::NeedsMint("token already expired");
        }

        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = match api.get(&app.spec.access_token_secret).await {
            Ok(secret) => secret,
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                return TokenState::NeedsMint("access token secret is missing");
            }
            Err(e) => {
                warn!("failed to read access token secret: {e}");
                return TokenState::NeedsMint("access token secret could not be read");
            }
        };

        if secrets::has_stray_fields(&secret) {
            return TokenState::NeedsMint("access token secret has stray fields");
        }

        let data = secret.data.unwrap_or_default();
        let username = data
            .get(crate::constants::ACCESS_TOKEN_USERNAME_KEY)
            .and_then(|v| std::str::from_utf8(&v.0).ok());
        let token = data
            .get(crate::constants::ACCESS_TOKEN_KEY)
            .and_then(|v| std::str::from_utf8(&v.0).ok());
        let (username, token) = match (username, token) {
            (Some(username), Some(token)) => (username, token),
            _ => return TokenState::NeedsMint("access token secret is incomplete"),
        };

        if !self.github.probe(username, token).await {
            return TokenState::NeedsMint("token failed the validation probe");
        }

        let threshold = chrono::Duration::from_std(self.config.expiry_threshold)
            .unwrap_or_else(|_| chrono::Duration::zero());
        if expires_at - now <= threshold {
            return TokenState::NeedsMint("token is inside the expiry threshold");
        }

        TokenState::Fresh
    }

    /// The mint pipeline: resolve key, exchange for a token, write the
    /// Secret, restart selected Deployments
    async fn mint_and_distribute(
        &self,
        app: &GithubApp,
        namespace: &str,
        name: &str,
    ) -> Result<DateTime<Utc>, MintError> {
        let resolved = self.keys.resolve(app).await.map_err(MintError::Renewal)?;

        let minted = match self
            .github
            .mint(app.spec.app_id, app.spec.install_id, &resolved.pem)
            .await
        {
            Ok(minted) => minted,
            Err(e) => {
                // A rejected exchange may mean the cached key went stale
                // after an external rotation; drop it so the next attempt
                // re-fetches from the remote source.
                if let Err(cache_err) = self.keys.invalidate(namespace, name) {
                    warn!("failed to drop cached key for {namespace}/{name}: {cache_err:#}");
                }
                return Err(MintError::Renewal(
                    anyhow::Error::from(e).context("failed to mint installation token"),
                ));
            }
        };

        secrets::upsert_access_token_secret(self, app, &minted.token)
            .await
            .map_err(MintError::Renewal)?;

        rollout::rollout_deployments(self, app)
            .await
            .map_err(|e| MintError::Rollout(e.context("failed to upgrade deployments after token renewal")))?;

        Ok(minted.expires_at)
    }

    /// Delete the owned Secrets, the cache entry and any self-write record
    async fn teardown(&self, namespace: &str, name: &str) -> Result<()> {
        secrets::delete_owned_secrets(self, namespace, name).await?;
        self.keys.invalidate(namespace, name)?;
        self.self_writes.forget(&format!("{namespace}/{name}"));
        Ok(())
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn ensure_finalizer(api: &Api<GithubApp>, app: &GithubApp, name: &str) -> Result<()> {
    if app.finalizers().iter().any(|f| f == FINALIZER) {
        return Ok(());
    }
    let mut finalizers = app.finalizers().to_vec();
    finalizers.push(FINALIZER.to_string());
    let patch = serde_json::json!({"metadata": {"finalizers": finalizers}});
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .with_context(|| format!("failed to add finalizer to GithubApp {name}"))?;
    Ok(())
}

async fn remove_finalizer(api: &Api<GithubApp>, app: &GithubApp, name: &str) -> Result<()> {
    if !app.finalizers().iter().any(|f| f == FINALIZER) {
        return Ok(());
    }
    let finalizers: Vec<String> = app
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != FINALIZER)
        .cloned()
        .collect();
    let patch = serde_json::json!({"metadata": {"finalizers": finalizers}});
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .with_context(|| format!("failed to remove finalizer from GithubApp {name}"))?;
    Ok(())
}
