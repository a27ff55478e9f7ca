//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `ecr_secret_reconciliations_total` - Total number of reconciliations
//! - `ecr_secret_reconciliation_errors_total` - Reconciliation errors by reason
//! - `ecr_secret_reconciliation_duration_seconds` - Duration of reconciliations
//! - `ecr_secret_secrets_created_total` - Pull secrets created
//! - `ecr_secret_secrets_regenerated_total` - Pull secrets rewritten, by reason (drift, malformed, renewal)
//! - `ecr_secret_status_update_failures_total` - Failed `ECRSecret` status writes
//! - `ecr_secret_requeues_total` - Requeues by reason
//! - `ecr_secret_renewal_sweeps_total` - Renewal sweeps by outcome
//! - `ecr_secret_renewal_notifications_total` - Reconciles requested by the renewal scanner
//! - `ecr_secret_malformed_annotations_total` - Managed secrets found with unusable annotations

mod controller_metrics;
mod registry;
mod renewal_metrics;

pub use controller_metrics::*;
pub use registry::{gather, register_metrics};
pub use renewal_metrics::*;
