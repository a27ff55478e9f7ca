//! # Reconciler
//!
//! Drives each `ECRSecret` toward a present, untampered and fresh pull secret.

mod reconcile;
mod types;

pub use reconcile::{construct_secret, kube_secret_name, reconcile, reconcile_key};
pub use types::{
    BackoffState, ReconcileOutcome, Reconciler, ReconcilerError, RegenerationReason,
};
