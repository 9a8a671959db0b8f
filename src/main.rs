//! # GitHub App Controller
//!
//! A Kubernetes controller that manages the lifecycle of short-lived GitHub
//! App installation access tokens on behalf of `GithubApp` custom resources.
//!
//! ## Overview
//!
//! For each `GithubApp` resource the controller:
//!
//! 1. **Resolves the app private key** - from a Kubernetes Secret, HashiCorp
//!    Vault (KV-v2 via Kubernetes auth) or GCP Secret Manager, fronted by an
//!    on-disk cache
//! 2. **Mints an installation token** - signs an RS256 app JWT and exchanges
//!    it with the GitHub App installation API
//! 3. **Stores the token** - in a namespaced Secret owned by the resource
//! 4. **Renews before expiry** - probing token validity against GitHub's
//!    rate-limit endpoint and re-minting inside the expiry threshold
//! 5. **Restarts consumers** - triggers rolling upgrades of label-selected
//!    Deployments whenever a new token is issued

use anyhow::{Context, Result};
use futures::StreamExt;
use github_app_controller::config::ControllerConfig;
use github_app_controller::controller::reconciler::Reconciler;
use github_app_controller::crd::GithubApp;
use github_app_controller::github::GithubClient;
use github_app_controller::identity::ControllerIdentity;
use github_app_controller::keys::KeyResolver;
use github_app_controller::observability::metrics;
use github_app_controller::server::{start_server, ControllerHealth};
use github_app_controller::webhook::start_webhook_server;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(ControllerConfig::from_env());

    let default_filter = if config.debug_log {
        "github_app_controller=debug"
    } else {
        "github_app_controller=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    info!(
        "Starting GitHub App Controller (build {} {})",
        env!("BUILD_GIT_HASH"),
        env!("BUILD_DATETIME")
    );

    // Vault's HTTP client honors the ambient proxy environment; export the
    // configured proxy before any Vault client is built
    if let Some(vault_proxy) = &config.vault_proxy_addr {
        std::env::set_var("HTTPS_PROXY", vault_proxy);
        info!("routing Vault traffic through proxy {vault_proxy}");
    }

    // Initialize metrics
    metrics::register_metrics()?;

    // Shared health state; the reconciler stamps it on every pass
    let health = ControllerHealth::new();

    // Start HTTP server for metrics and probes
    let probe_health = health.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(metrics_port, probe_health).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Start the validating admission webhook
    let webhook_port = config.webhook_port;
    tokio::spawn(async move {
        if let Err(e) = start_webhook_server(webhook_port).await {
            error!("Admission webhook server error: {}", e);
        }
    });

    // Discover who we are; Vault-backed resolves need this to authenticate
    let identity = match ControllerIdentity::discover(&config.service_account_token_path) {
        Ok(identity) => {
            info!(
                "running as {}/{}",
                identity.namespace, identity.service_account
            );
            Some(identity)
        }
        Err(e) => {
            warn!("could not discover controller identity, Vault key sources will fail: {e:#}");
            None
        }
    };

    // One GitHub-bound HTTP client per process; the explicit no_proxy keeps
    // a Vault-only proxy from capturing GitHub traffic
    let mut github_http = reqwest::Client::builder();
    github_http = match &config.github_proxy {
        Some(proxy_url) => github_http.proxy(
            reqwest::Proxy::all(proxy_url)
                .with_context(|| format!("invalid GITHUB_PROXY '{proxy_url}'"))?,
        ),
        None => github_http.no_proxy(),
    };
    let github_http = github_http
        .build()
        .context("failed to build GitHub HTTP client")?;
    let github = GithubClient::new(github_http.clone());

    // Create Kubernetes client
    let client = Client::try_default().await?;

    let keys = KeyResolver::new(
        client.clone(),
        github_http,
        config.clone(),
        identity.clone(),
    );
    let reconciler = Arc::new(Reconciler::new(
        client.clone(),
        config.clone(),
        github,
        keys,
        health.clone(),
    ));

    // Watch GithubApps across all namespaces, plus the Secrets they own
    let apps: Api<GithubApp> = Api::all(client.clone());
    let secrets: Api<Secret> = Api::all(client.clone());

    // Mark as ready
    health.mark_ready();

    Controller::new(apps, watcher::Config::default().any_semantic())
        .owns(secrets, watcher::Config::default())
        .shutdown_on_signal()
        .run(
            Reconciler::reconcile,
            Reconciler::error_policy,
            reconciler.clone(),
        )
        .for_each(|_| std::future::ready(()))
        .await;

    info!("Controller stopped");

    Ok(())
}
