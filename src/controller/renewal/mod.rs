//! # Renewal Scanner
//!
//! Periodically sweeps every namespace for managed pull secrets whose token
//! has outlived the maximum secret age, and asks the controller to
//! reconcile their owning `ECRSecret`.
//!
//! Sweeps never overlap: a sweep that would start while another is running
//! is skipped. The scanner polls for its next sweep at a fine granularity so
//! that cancellation is observed promptly, including in the middle of a
//! sweep.

use crate::clock::Clock;
use crate::controller::secret::{
    ecr_secret_owner, renewal_status, RenewalStatus, DOCKER_CONFIG_TYPE,
};
use crate::controller::store::{ClusterStore, StoreError};
use crate::crd::ECRSecret;
use crate::observability;
use futures::channel::mpsc;
use futures::SinkExt;
use kube_runtime::reflector::ObjectRef;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub type RenewalSender = mpsc::Sender<ObjectRef<ECRSecret>>;
pub type RenewalReceiver = mpsc::Receiver<ObjectRef<ECRSecret>>;

/// Bounded queue from the scanner to the controller
#[must_use]
pub fn renewal_channel(buffer: usize) -> (RenewalSender, RenewalReceiver) {
    mpsc::channel(buffer)
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unable to list namespaces: {0}")]
    ListNamespaces(#[source] StoreError),
    #[error("renewal notification channel closed: {0}")]
    ChannelClosed(#[from] mpsc::SendError),
}

/// Counts from one completed sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub namespaces: usize,
    pub namespace_failures: usize,
    pub secrets_examined: usize,
    pub notifications: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep held the lock
    Skipped,
    /// The cluster cache is not ready yet
    NotReady,
}

#[derive(Debug, Clone)]
pub struct RenewalScanner {
    store: Arc<dyn ClusterStore>,
    clock: Arc<dyn Clock>,
    max_age: chrono::Duration,
    frequency: Duration,
    poll_interval: Duration,
    sweep_lock: Arc<tokio::sync::Mutex<()>>,
    notifications: RenewalSender,
}

impl RenewalScanner {
    #[must_use]
    pub fn new(
        store: Arc<dyn ClusterStore>,
        clock: Arc<dyn Clock>,
        max_age: chrono::Duration,
        frequency: Duration,
        poll_interval: Duration,
        notifications: RenewalSender,
    ) -> Self {
        Self {
            store,
            clock,
            max_age,
            frequency,
            poll_interval,
            sweep_lock: Arc::new(tokio::sync::Mutex::new(())),
            notifications,
        }
    }

    /// Run sweeps every `frequency` until `cancel` fires
    ///
    /// The first sweep runs immediately. Stops early if the controller has
    /// dropped its end of the notification channel.
    pub async fn start(self, cancel: CancellationToken) {
        info!(
            frequency = ?self.frequency,
            max_age = %self.max_age,
            "Starting renewal scanner"
        );
        let mut next_sweep = Instant::now();

        loop {
            if Instant::now() >= next_sweep {
                let result = tokio::select! {
                    () = cancel.cancelled() => {
                        info!("Renewal scanner cancelled during sweep");
                        return;
                    }
                    result = self.try_sweep() => result,
                };
                if let Err(ScanError::ChannelClosed(_)) = result {
                    error!(
                        "Controller stopped accepting renewal notifications, stopping renewal scanner"
                    );
                    return;
                }
                next_sweep = Instant::now() + self.frequency;
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Renewal scanner stopped");
                    return;
                }
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Run one sweep unless one is already in progress
    ///
    /// # Errors
    ///
    /// Returns an error if namespaces cannot be listed or the notification
    /// channel is closed. Failures in a single namespace are logged and
    /// skipped.
    pub async fn try_sweep(&self) -> Result<SweepOutcome, ScanError> {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            debug!("Renewal sweep already in progress, skipping");
            observability::metrics::increment_renewal_sweeps("skipped");
            return Ok(SweepOutcome::Skipped);
        };

        let result = self.sweep().await;
        let outcome = match &result {
            Ok(SweepOutcome::Completed(_)) => "completed",
            Ok(SweepOutcome::NotReady) => "not_ready",
            Ok(SweepOutcome::Skipped) => "skipped",
            Err(_) => "failed",
        };
        observability::metrics::increment_renewal_sweeps(outcome);
        result
    }

    async fn sweep(&self) -> Result<SweepOutcome, ScanError> {
        info!("Polling for secrets that require renewal");

        let namespaces = match self.store.list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(StoreError::NotReady) => {
                debug!("Cluster store not ready, deferring renewal sweep");
                return Ok(SweepOutcome::NotReady);
            }
            Err(e) => {
                error!(error = %e, "Unable to list namespaces");
                return Err(ScanError::ListNamespaces(e));
            }
        };

        let now = self.clock.now();
        let mut sender = self.notifications.clone();
        let mut report = SweepReport {
            namespaces: namespaces.len(),
            ..SweepReport::default()
        };

        for namespace in &namespaces {
            let secrets = match self.store.list_secrets(namespace).await {
                Ok(secrets) => secrets,
                Err(e) => {
                    error!(namespace = %namespace, error = %e, "Unable to list secrets");
                    report.namespace_failures += 1;
                    continue;
                }
            };

            for secret in &secrets {
                report.secrets_examined += 1;
                if secret.type_.as_deref() != Some(DOCKER_CONFIG_TYPE) {
                    continue;
                }

                let secret_name = secret.metadata.name.as_deref().unwrap_or_default();
                let status = renewal_status(secret, self.max_age, now);
                match &status {
                    RenewalStatus::Malformed(reason) => {
                        warn!(
                            namespace = %namespace,
                            secret = %secret_name,
                            reason = %reason,
                            "Managed secret has malformed annotations, forcing renewal"
                        );
                        observability::metrics::increment_malformed_annotations();
                    }
                    RenewalStatus::Due { renew_after } => {
                        debug!(
                            namespace = %namespace,
                            secret = %secret_name,
                            renew_after = %renew_after,
                            "Secret needs renewal"
                        );
                    }
                    _ => {}
                }
                if !status.is_renewal_due() {
                    continue;
                }

                let Some(owner) = ecr_secret_owner(secret) else {
                    debug!(
                        namespace = %namespace,
                        secret = %secret_name,
                        "Secret is not owned by an ECRSecret"
                    );
                    continue;
                };

                match self.store.get_ecr_secret(namespace, &owner.name).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        debug!(
                            namespace = %namespace,
                            owner = %owner.name,
                            "Owning ECRSecret no longer exists"
                        );
                        continue;
                    }
                    Err(e) => {
                        error!(
                            namespace = %namespace,
                            owner = %owner.name,
                            error = %e,
                            "Cannot get owning ECRSecret"
                        );
                        continue;
                    }
                }

                sender
                    .send(ObjectRef::new(&owner.name).within(namespace))
                    .await?;
                report.notifications += 1;
                observability::metrics::increment_renewal_notifications();
            }
        }

        info!(
            namespaces = report.namespaces,
            notifications = report.notifications,
            "Renewal poll complete"
        );
        Ok(SweepOutcome::Completed(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::controller::secret::{ANNOTATION_EXPIRES, ANNOTATION_LIFETIME};
    use crate::controller::store::memory::MemoryStore;
    use crate::crd::ECRSecretSpec;
    use chrono::{DateTime, Utc};
    use futures::StreamExt;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use std::collections::BTreeMap;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn owner_ref(name: &str) -> OwnerReference {
        OwnerReference {
            api_version: "secrets.fireflycons.io/v1beta1".to_string(),
            kind: "ECRSecret".to_string(),
            name: name.to_string(),
            uid: format!("{name}-uid"),
            controller: Some(true),
            block_owner_deletion: None,
        }
    }

    fn managed_secret(namespace: &str, name: &str, owner: &str, expires: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                annotations: Some(BTreeMap::from([
                    (ANNOTATION_EXPIRES.to_string(), expires.to_string()),
                    (ANNOTATION_LIFETIME.to_string(), "12h0m0s".to_string()),
                ])),
                owner_references: Some(vec![owner_ref(owner)]),
                ..Default::default()
            },
            type_: Some(DOCKER_CONFIG_TYPE.to_string()),
            ..Default::default()
        }
    }

    fn ecr_secret(namespace: &str, name: &str) -> ECRSecret {
        let mut resource = ECRSecret::new(
            name,
            ECRSecretSpec {
                registry: "123456789012.dkr.ecr.eu-west-1.amazonaws.com".to_string(),
                secret_name: None,
            },
        );
        resource.metadata.namespace = Some(namespace.to_string());
        resource
    }

    /// Clock at 12:00, four hour maximum age: tokens expiring before 20:00 are due
    fn scanner(store: &MemoryStore, buffer: usize) -> (RenewalScanner, RenewalReceiver) {
        let (tx, rx) = renewal_channel(buffer);
        let scanner = RenewalScanner::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(at("2023-03-01T12:00:00Z"))),
            chrono::Duration::hours(4),
            Duration::from_secs(60),
            Duration::from_millis(500),
            tx,
        );
        (scanner, rx)
    }

    #[tokio::test]
    async fn test_sweep_notifies_owner_of_due_secret() {
        let store = MemoryStore::default();
        store.insert_ecr_secret(ecr_secret("apps", "registry"));
        store.insert_secret(managed_secret(
            "apps",
            "registry-secret",
            "registry",
            "2023-03-01T19:59:59Z",
        ));
        store.insert_ecr_secret(ecr_secret("apps", "fresh"));
        store.insert_secret(managed_secret(
            "apps",
            "fresh-secret",
            "fresh",
            "2023-03-01T20:00:00Z",
        ));

        let (scanner, mut rx) = scanner(&store, 8);
        let outcome = scanner.try_sweep().await.unwrap();

        assert_eq!(
            outcome,
            SweepOutcome::Completed(SweepReport {
                namespaces: 1,
                namespace_failures: 0,
                secrets_examined: 2,
                notifications: 1,
            })
        );
        assert_eq!(
            rx.next().await,
            Some(ObjectRef::new("registry").within("apps"))
        );
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn test_sweep_skips_unowned_and_foreign_secrets() {
        let store = MemoryStore::default();
        let mut orphan = managed_secret("apps", "orphan", "registry", "2023-03-01T00:00:00Z");
        orphan.metadata.owner_references = None;
        store.insert_secret(orphan);

        let mut opaque = managed_secret("apps", "opaque", "registry", "2023-03-01T00:00:00Z");
        opaque.type_ = Some("Opaque".to_string());
        store.insert_secret(opaque);

        let mut foreign = managed_secret("apps", "foreign", "registry", "2023-03-01T00:00:00Z");
        foreign.metadata.owner_references.as_mut().unwrap()[0].kind = "Deployment".to_string();
        store.insert_secret(foreign);

        // Owner deleted, secret awaiting garbage collection
        store.insert_secret(managed_secret("apps", "gone-secret", "gone", "2023-03-01T00:00:00Z"));

        let (scanner, mut rx) = scanner(&store, 8);
        let outcome = scanner.try_sweep().await.unwrap();
        assert!(matches!(
            outcome,
            SweepOutcome::Completed(SweepReport { notifications: 0, .. })
        ));
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn test_malformed_annotations_trigger_renewal() {
        let store = MemoryStore::default();
        store.insert_ecr_secret(ecr_secret("apps", "registry"));
        let mut secret =
            managed_secret("apps", "registry-secret", "registry", "2099-01-01T00:00:00Z");
        secret
            .metadata
            .annotations
            .as_mut()
            .unwrap()
            .insert(ANNOTATION_LIFETIME.to_string(), "12x".to_string());
        store.insert_secret(secret);

        let (scanner, mut rx) = scanner(&store, 8);
        scanner.try_sweep().await.unwrap();
        assert_eq!(
            rx.next().await,
            Some(ObjectRef::new("registry").within("apps"))
        );
    }

    #[tokio::test]
    async fn test_namespace_failure_does_not_abort_sweep() {
        let store = MemoryStore::default();
        store.add_namespace("broken");
        store.fail_secret_listing("broken");
        store.insert_ecr_secret(ecr_secret("apps", "registry"));
        store.insert_secret(managed_secret(
            "apps",
            "registry-secret",
            "registry",
            "2023-03-01T00:00:00Z",
        ));

        let (scanner, mut rx) = scanner(&store, 8);
        let outcome = scanner.try_sweep().await.unwrap();
        assert!(matches!(
            outcome,
            SweepOutcome::Completed(SweepReport {
                namespaces: 2,
                namespace_failures: 1,
                notifications: 1,
                ..
            })
        ));
        assert!(rx.next().await.is_some());
    }

    #[tokio::test]
    async fn test_not_ready_store_is_benign() {
        let store = MemoryStore::default();
        store.set_not_ready(true);
        let (scanner, _rx) = scanner(&store, 8);
        assert_eq!(scanner.try_sweep().await.unwrap(), SweepOutcome::NotReady);
    }

    #[tokio::test]
    async fn test_namespace_listing_failure_is_error() {
        let store = MemoryStore::default();
        store.fail_namespace_listing();
        let (scanner, _rx) = scanner(&store, 8);
        assert!(matches!(
            scanner.try_sweep().await,
            Err(ScanError::ListNamespaces(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_channel_is_error() {
        let store = MemoryStore::default();
        store.insert_ecr_secret(ecr_secret("apps", "registry"));
        store.insert_secret(managed_secret(
            "apps",
            "registry-secret",
            "registry",
            "2023-03-01T00:00:00Z",
        ));

        let (scanner, rx) = scanner(&store, 8);
        drop(rx);
        assert!(matches!(
            scanner.try_sweep().await,
            Err(ScanError::ChannelClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_overlapping_sweep_is_skipped() {
        let store = MemoryStore::default();
        let (started, release) = store.hold_listing();
        let (scanner, _rx) = scanner(&store, 8);

        let running = tokio::spawn({
            let scanner = scanner.clone();
            async move { scanner.try_sweep().await }
        });
        started.notified().await;

        assert_eq!(scanner.try_sweep().await.unwrap(), SweepOutcome::Skipped);

        release.notify_one();
        assert!(matches!(
            running.await.unwrap().unwrap(),
            SweepOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_full_channel_applies_backpressure() {
        let store = MemoryStore::default();
        for name in ["a", "b", "c"] {
            store.insert_ecr_secret(ecr_secret("apps", name));
            store.insert_secret(managed_secret(
                "apps",
                &format!("{name}-secret"),
                name,
                "2023-03-01T00:00:00Z",
            ));
        }

        let (scanner, mut rx) = scanner(&store, 0);
        let sweep = tokio::spawn(async move { scanner.try_sweep().await });

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(rx.next().await.unwrap());
        }
        assert!(matches!(
            sweep.await.unwrap().unwrap(),
            SweepOutcome::Completed(SweepReport { notifications: 3, .. })
        ));
        received.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            received,
            vec![
                ObjectRef::new("a").within("apps"),
                ObjectRef::new("b").within("apps"),
                ObjectRef::new("c").within("apps"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_sweeps_on_schedule_and_stops_on_cancel() {
        let store = MemoryStore::default();
        store.insert_ecr_secret(ecr_secret("apps", "registry"));
        store.insert_secret(managed_secret(
            "apps",
            "registry-secret",
            "registry",
            "2023-03-01T00:00:00Z",
        ));

        let (scanner, mut rx) = scanner(&store, 8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scanner.start(cancel.clone()));

        // First sweep runs immediately
        assert!(rx.next().await.is_some());

        // Next sweep waits for the frequency to elapse
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_next().is_err());
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(rx.next().await.is_some());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_abandons_sweep_in_progress() {
        let store = MemoryStore::default();
        let (started, _release) = store.hold_listing();
        let (scanner, _rx) = scanner(&store, 8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scanner.clone().start(cancel.clone()));

        started.notified().await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        // The abandoned sweep no longer holds the sweep lock
        assert!(matches!(
            scanner.try_sweep().await.unwrap(),
            SweepOutcome::Completed(_)
        ));
    }
}
