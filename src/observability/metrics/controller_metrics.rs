//! # Controller Metrics
//!
//! Reconciliation counts, durations and the writes they perform.

use super::registry::REGISTRY;
use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec};
use std::sync::LazyLock;

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ecr_secret_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ecr_secret_reconciliation_errors_total",
            "Total number of reconciliation errors by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "ecr_secret_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static SECRETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ecr_secret_secrets_created_total",
        "Total number of pull secrets created",
    )
    .expect("Failed to create SECRETS_CREATED_TOTAL metric - this should never happen")
});

static SECRETS_REGENERATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ecr_secret_secrets_regenerated_total",
            "Total number of pull secrets rewritten with a fresh token, by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create SECRETS_REGENERATED_TOTAL metric - this should never happen")
});

static STATUS_UPDATE_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ecr_secret_status_update_failures_total",
        "Total number of failed ECRSecret status updates",
    )
    .expect("Failed to create STATUS_UPDATE_FAILURES_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ecr_secret_requeues_total",
            "Total number of reconciliation requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

pub(crate) fn register_controller_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(SECRETS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_REGENERATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_UPDATE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_secrets_created() {
    SECRETS_CREATED_TOTAL.inc();
}

/// `reason` is `drift` or `renewal`
pub fn increment_secrets_regenerated(reason: &str) {
    SECRETS_REGENERATED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_status_update_failures() {
    STATUS_UPDATE_FAILURES_TOTAL.inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
