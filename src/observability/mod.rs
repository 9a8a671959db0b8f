//! # Observability
//!
//! Observability modules for the controller.
//!
//! - `metrics`: Prometheus metrics collection

pub mod metrics;
