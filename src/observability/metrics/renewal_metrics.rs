//! # Renewal Metrics
//!
//! Sweeps run by the renewal scanner and the reconciles they request.

use super::registry::REGISTRY;
use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec};
use std::sync::LazyLock;

static RENEWAL_SWEEPS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ecr_secret_renewal_sweeps_total",
            "Total number of renewal sweeps by outcome (completed, skipped, not_ready, failed)",
        ),
        &["outcome"],
    )
    .expect("Failed to create RENEWAL_SWEEPS_TOTAL metric - this should never happen")
});

static RENEWAL_NOTIFICATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ecr_secret_renewal_notifications_total",
        "Total number of reconciles requested by the renewal scanner",
    )
    .expect("Failed to create RENEWAL_NOTIFICATIONS_TOTAL metric - this should never happen")
});

static MALFORMED_ANNOTATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ecr_secret_malformed_annotations_total",
        "Total number of managed secrets found with unusable expiry or lifetime annotations",
    )
    .expect("Failed to create MALFORMED_ANNOTATIONS_TOTAL metric - this should never happen")
});

pub(crate) fn register_renewal_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RENEWAL_SWEEPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RENEWAL_NOTIFICATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MALFORMED_ANNOTATIONS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_renewal_sweeps(outcome: &str) {
    RENEWAL_SWEEPS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_renewal_notifications() {
    RENEWAL_NOTIFICATIONS_TOTAL.inc();
}

pub fn increment_malformed_annotations() {
    MALFORMED_ANNOTATIONS_TOTAL.inc();
}

#[cfg(test)]
pub(crate) fn malformed_annotations_total() -> u64 {
    MALFORMED_ANNOTATIONS_TOTAL.get()
}
