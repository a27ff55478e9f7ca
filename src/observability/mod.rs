//! # Observability
//!
//! Prometheus metrics for the reconciler and the renewal scanner.

pub mod metrics;
