//! # Reconcile
//!
//! One pass over an `ECRSecret`: make sure its pull secret exists, matches
//! its recorded identity, and holds a token younger than the maximum age.

use super::types::{ReconcileOutcome, Reconciler, ReconcilerError, RegenerationReason};
use crate::clock::Clock;
use crate::config::load_credentials;
use crate::controller::secret::{
    apply_regeneration, build_payload, is_drifted, renewal_status, secret_content_uid,
    stamp_content_uid, RenewalStatus, DOCKER_CONFIG_TYPE,
};
use crate::crd::{ECRSecret, ECRSecretStatus, RegistryRef};
use crate::observability;
use crate::provider::TokenFetcher;
use chrono::SecondsFormat;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Name of the secret managed for an `ECRSecret`
///
/// `spec.secretName` when it is non-blank, otherwise `<metadata.name>-secret`.
#[must_use]
pub fn kube_secret_name(ecr_secret: &ECRSecret) -> String {
    match ecr_secret.spec.secret_name.as_deref() {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => format!("{}-secret", ecr_secret.name_any()),
    }
}

/// Build a new pull secret owned by `owner`
///
/// # Errors
///
/// Returns an error if `owner` has no uid or the token cannot be fetched.
pub async fn construct_secret(
    owner: &ECRSecret,
    fetcher: &dyn TokenFetcher,
    clock: &dyn Clock,
) -> Result<Secret, ReconcilerError> {
    let owner_reference = owner
        .controller_owner_ref(&())
        .ok_or_else(|| ReconcilerError::MissingOwnerUid(owner.name_any()))?;

    let content = build_payload(fetcher, clock).await?;

    let mut secret = Secret {
        metadata: ObjectMeta {
            name: Some(kube_secret_name(owner)),
            namespace: owner.namespace(),
            annotations: Some(content.annotations),
            owner_references: Some(vec![owner_reference]),
            ..Default::default()
        },
        type_: Some(DOCKER_CONFIG_TYPE.to_string()),
        data: Some(content.data),
        ..Default::default()
    };
    stamp_content_uid(&mut secret);
    Ok(secret)
}

/// Reconcile the `ECRSecret` `namespace/name`
///
/// # Errors
///
/// Returns an error if credentials cannot be loaded, the registry is
/// invalid, the token cannot be fetched, or the cluster refuses a read or
/// write. Configuration errors are fatal to the controller.
pub async fn reconcile_key(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let Some(ecr_secret) = ctx.store.get_ecr_secret(namespace, name).await? else {
        debug!("ECRSecret {}/{} no longer exists", namespace, name);
        return Ok(ReconcileOutcome::NoOp);
    };

    let registry = RegistryRef::parse(&ecr_secret.spec.registry)?;
    let credentials = load_credentials(&ctx.config_file, &registry.account_id).await?;
    let fetcher = ctx.source.configure(&credentials, &registry.region).await?;

    let secret_name = kube_secret_name(&ecr_secret);

    let outcome = match ctx.store.get_secret(namespace, &secret_name).await? {
        None => {
            info!("Creating secret {}/{}", namespace, secret_name);
            let secret = construct_secret(&ecr_secret, fetcher.as_ref(), ctx.clock.as_ref()).await?;
            ctx.store.create_secret(namespace, &secret).await?;
            observability::metrics::increment_secrets_created();
            ReconcileOutcome::Created {
                uid: secret_content_uid(&secret),
                secret: secret_name,
            }
        }
        Some(mut secret) => {
            let status = renewal_status(&secret, ctx.max_age, ctx.clock.now());
            if let RenewalStatus::Malformed(malformed) = &status {
                warn!(
                    reason = %malformed,
                    "Managed secret {}/{} has malformed annotations, forcing renewal",
                    namespace,
                    secret_name
                );
                observability::metrics::increment_malformed_annotations();
            }

            let reason = if is_drifted(&secret) {
                Some(RegenerationReason::Drift)
            } else if matches!(status, RenewalStatus::Malformed(_)) {
                Some(RegenerationReason::Malformed)
            } else if status.is_renewal_due() {
                Some(RegenerationReason::Renewal)
            } else {
                None
            };

            let Some(reason) = reason else {
                debug!("Secret {}/{} is current", namespace, secret_name);
                return Ok(ReconcileOutcome::NoOp);
            };

            info!(
                reason = reason.as_str(),
                "Regenerating secret {}/{}", namespace, secret_name
            );
            let uid = apply_regeneration(&mut secret, fetcher.as_ref(), ctx.clock.as_ref()).await?;
            ctx.store.replace_secret(namespace, &secret).await?;
            observability::metrics::increment_secrets_regenerated(reason.as_str());
            ReconcileOutcome::Regenerated {
                secret: secret_name,
                uid,
                reason,
            }
        }
    };

    record_last_updated(ctx, namespace, name).await;
    Ok(outcome)
}

async fn record_last_updated(ctx: &Reconciler, namespace: &str, name: &str) {
    let status = ECRSecretStatus {
        last_updated: Some(ctx.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    };
    if let Err(e) = ctx.store.patch_status(namespace, name, &status).await {
        warn!(
            error = %e,
            "Failed to update status of ECRSecret {}/{}", namespace, name
        );
        observability::metrics::increment_status_update_failures();
    }
}

/// Controller entry point
///
/// # Errors
///
/// Returns the error of the pass; the error policy decides how to retry.
pub async fn reconcile(
    ecr_secret: Arc<ECRSecret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = ecr_secret.namespace().unwrap_or_else(|| "default".to_string());
    let name = ecr_secret.name_any();

    let span = tracing::info_span!(
        "controller.reconcile",
        resource.namespace = %namespace,
        resource.name = %name
    );

    let start = Instant::now();
    observability::metrics::increment_reconciliations();

    let result = reconcile_key(&ctx, &namespace, &name)
        .instrument(span)
        .await;
    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    let outcome = result?;
    ctx.reset_backoff(&format!("{namespace}/{name}"));
    debug!(?outcome, "Reconciliation complete");
    Ok(Action::await_change())
}
