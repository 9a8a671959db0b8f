//! # Health and Metrics Endpoints
//!
//! The controller's operational surface:
//! - `/healthz` - liveness, 200 for as long as the process runs
//! - `/readyz` - readiness; 503 until the controller is wired to the API
//!   server, afterwards reports how long ago the reconcile loop last ran
//! - `/metrics` - Prometheus text format
//!
//! Readiness is driven by [`ControllerHealth`], which the reconciler stamps
//! on every pass, so `/readyz` reflects a live reconcile loop rather than
//! just a bound listener.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Operational state shared between the reconciler and the probe endpoints
#[derive(Debug, Default)]
pub struct ControllerHealth {
    ready: AtomicBool,
    /// Unix timestamp of the most recent reconcile pass, 0 before the first
    last_reconcile_unix: AtomicI64,
}

impl ControllerHealth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Flip readiness once the controller is wired to the API server
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    /// Stamp a heartbeat; called by the reconciler at the start of each pass
    pub fn record_reconcile(&self) {
        self.last_reconcile_unix
            .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Seconds since the last reconcile pass, `None` until one has run
    fn reconcile_age_seconds(&self) -> Option<i64> {
        match self.last_reconcile_unix.load(Ordering::Relaxed) {
            0 => None,
            stamp => Some((chrono::Utc::now().timestamp() - stamp).max(0)),
        }
    }
}

/// Body returned by `/readyz`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadyzResponse {
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_reconcile_age_seconds: Option<i64>,
}

/// Serve the health and metrics endpoints on the given port
pub async fn start_server(port: u16, health: Arc<ControllerHealth>) -> Result<(), anyhow::Error> {
    let app = Router::new()
        .route("/healthz", get(|| async { StatusCode::OK }))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(health);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("health and metrics server listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn readyz(State(health): State<Arc<ControllerHealth>>) -> impl IntoResponse {
    let body = ReadyzResponse {
        ready: health.is_ready(),
        last_reconcile_age_seconds: health.reconcile_age_seconds(),
    };
    let status = if body.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn metrics() -> impl IntoResponse {
    let families = crate::observability::metrics::REGISTRY.gather();
    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            buffer,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {e}"),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_starts_false_and_flips_once_marked() {
        let health = ControllerHealth::new();
        assert!(!health.is_ready());

        health.mark_ready();
        assert!(health.is_ready());
    }

    #[test]
    fn reconcile_age_is_unknown_until_first_pass() {
        let health = ControllerHealth::new();
        assert_eq!(health.reconcile_age_seconds(), None);

        health.record_reconcile();
        let age = health.reconcile_age_seconds().expect("heartbeat recorded");
        assert!(age >= 0);
        assert!(age < 5, "fresh heartbeat should read as recent, got {age}s");
    }
}
