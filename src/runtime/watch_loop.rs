//! # Watch Loop
//!
//! Runs the Kubernetes controller over `ECRSecret` resources. Reconciles are
//! triggered by changes to an `ECRSecret`, by changes to a secret it owns,
//! and by renewal notifications from the renewal scanner.

use crate::constants;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::renewal::RenewalReceiver;
use crate::controller::server::ServerState;
use crate::crd::ECRSecret;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use kube_runtime::{watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Run the controller until SIGTERM or SIGINT
///
/// # Errors
///
/// Currently infallible; the signature leaves room for startup checks.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    renewals: RenewalReceiver,
    server_state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ecr_secrets: Api<ECRSecret> = Api::all(client.clone());
    let secrets: Api<Secret> = Api::all(client);
    let backoff = Arc::new(AtomicU64::new(constants::DEFAULT_BACKOFF_START_MS));

    info!("Starting controller watch loop...");

    Controller::new(ecr_secrets, watcher::Config::default().any_semantic())
        .owns(secrets, watcher::Config::default())
        .reconcile_on(renewals)
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| {
            let backoff = Arc::clone(&backoff);
            async move {
                match result {
                    Ok((object, _action)) => {
                        backoff.store(constants::DEFAULT_BACKOFF_START_MS, Ordering::Relaxed);
                        debug!(resource = %object, "watch.event.success");
                    }
                    Err(e) => {
                        handle_watch_stream_error(
                            &format!("{e:?}"),
                            &backoff,
                            constants::DEFAULT_BACKOFF_MAX_MS,
                        )
                        .await;
                    }
                }
            }
        })
        .await;

    server_state.set_ready(false);
    info!("Controller watch loop stopped");
    Ok(())
}
