//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `github_app_reconciliations_total` - Total number of reconciliations
//! - `github_app_reconciliation_errors_total` - Total number of reconciliation errors
//! - `github_app_reconcile_duration_seconds` - Duration of reconciliation operations
//! - `github_app_tokens_minted_total` - Total number of installation tokens minted
//! - `github_app_rollouts_triggered_total` - Total number of Deployment rollouts triggered

use anyhow::Result;
use prometheus::{Histogram, IntCounter, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "github_app_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "github_app_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "github_app_reconcile_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILE_DURATION metric - this should never happen")
});

static TOKENS_MINTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "github_app_tokens_minted_total",
        "Total number of installation access tokens minted",
    )
    .expect("Failed to create TOKENS_MINTED_TOTAL metric - this should never happen")
});

static ROLLOUTS_TRIGGERED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "github_app_rollouts_triggered_total",
        "Total number of Deployment rollouts triggered after a token renewal",
    )
    .expect("Failed to create ROLLOUTS_TRIGGERED_TOTAL metric - this should never happen")
});

/// Register all metrics with the process registry; called once at startup
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_DURATION.clone()))?;
    REGISTRY.register(Box::new(TOKENS_MINTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROLLOUTS_TRIGGERED_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconcile_duration(seconds: f64) {
    RECONCILE_DURATION.observe(seconds);
}

pub fn increment_tokens_minted() {
    TOKENS_MINTED_TOTAL.inc();
}

pub fn increment_rollouts_triggered() {
    ROLLOUTS_TRIGGERED_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        increment_reconciliations();
        assert_eq!(RECONCILIATIONS_TOTAL.get(), before + 2);
    }

    #[test]
    fn register_is_idempotent_per_process() {
        // First registration wins; a second call reports AlreadyReg
        let first = register_metrics();
        let second = register_metrics();
        assert!(first.is_ok() || second.is_err());
    }
}
