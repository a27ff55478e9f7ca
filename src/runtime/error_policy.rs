//! # Error Policy
//!
//! Error handling and backoff for the controller watch loop: failed
//! reconciliations and errors on the controller stream itself.

use crate::constants;
use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::ECRSecret;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Delay before the next attempt for `resource_key`, and its error count
///
/// Each resource keeps its own Fibonacci sequence so that one failing
/// resource does not slow down the others.
pub fn next_backoff(ctx: &Reconciler, resource_key: &str) -> (u64, u32) {
    match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(resource_key.to_string())
                .or_insert_with(BackoffState::new);
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!(
                "Failed to lock backoff_states: {}, using default backoff",
                e
            );
            (constants::DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS, 0)
        }
    }
}

/// Decide what to do after a failed reconciliation
///
/// Configuration errors terminate the process. Anything else is retried
/// with per-resource Fibonacci backoff.
pub fn handle_reconciliation_error(
    obj: Arc<ECRSecret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    observability::metrics::increment_reconciliation_errors(error.reason());

    if error.is_fatal() {
        error!(
            resource.namespace = %namespace,
            resource.name = %name,
            "{}", error
        );
        error!("Cannot continue without valid credentials configuration, exiting");
        std::process::exit(1);
    }

    error!(
        resource.namespace = %namespace,
        resource.name = %name,
        error = %error,
        "Reconciliation error for {}/{}", namespace, name
    );

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = next_backoff(&ctx, &resource_key);

    info!(
        "🔄 Retrying {} in {}s (error count: {}, trigger source: error-backoff)",
        resource_key, backoff_seconds, error_count
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(std::time::Duration::from_secs(backoff_seconds))
}

/// What the watch loop should do with a controller stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    Unauthorized,
    Expired,
    StorageReinitializing,
    NotFound,
    Other,
}

impl WatchErrorKind {
    #[must_use]
    pub fn classify(error_string: &str) -> Self {
        if error_string.contains("401") || error_string.contains("Unauthorized") {
            Self::Unauthorized
        } else if error_string.contains("410")
            || error_string.contains("too old resource version")
            || error_string.contains("Expired")
            || error_string.contains("Gone")
        {
            Self::Expired
        } else if error_string.contains("429")
            || error_string.contains("storage is (re)initializing")
            || error_string.contains("TooManyRequests")
        {
            Self::StorageReinitializing
        } else if error_string.contains("ObjectNotFound")
            || (error_string.contains("404") && error_string.contains("not found"))
        {
            Self::NotFound
        } else {
            Self::Other
        }
    }
}

/// Log a controller stream error and pause as its kind requires
///
/// Storage reinitialization backs off exponentially up to `max_backoff_ms`.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
) -> WatchErrorKind {
    let kind = WatchErrorKind::classify(error_string);
    match kind {
        WatchErrorKind::Unauthorized => {
            error!("❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
            error!("🔍 Check that the controller's ClusterRole still grants list/watch on ecrsecrets, secrets and namespaces");
            warn!(
                "⏳ Waiting {}s before resuming watch...",
                constants::DEFAULT_WATCH_RESTART_DELAY_SECS
            );
            tokio::time::sleep(std::time::Duration::from_secs(
                constants::DEFAULT_WATCH_RESTART_DELAY_SECS,
            ))
            .await;
        }
        WatchErrorKind::Expired => {
            warn!("Watch resource version expired (410), watch will restart");
        }
        WatchErrorKind::StorageReinitializing => {
            let current_backoff = backoff.load(Ordering::Relaxed);
            warn!(
                "API server storage reinitializing (429), backing off for {}ms...",
                current_backoff
            );
            tokio::time::sleep(std::time::Duration::from_millis(current_backoff)).await;
            backoff.store((current_backoff * 2).min(max_backoff_ms), Ordering::Relaxed);
        }
        WatchErrorKind::NotFound => {
            warn!("Resource not found (likely deleted), continuing watch...");
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(std::time::Duration::from_secs(
                constants::DEFAULT_WATCH_RESTART_DELAY_SECS,
            ))
            .await;
        }
    }
    kind
}
