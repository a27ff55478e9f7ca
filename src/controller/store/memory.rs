//! In-memory cluster store for driving the reconciler and the renewal sweep
//! in tests.

use super::{ClusterStore, StoreError};
use crate::crd::{ECRSecret, ECRSecretStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

type Key = (String, String);

#[derive(Debug, Default)]
struct State {
    namespaces: BTreeSet<String>,
    ecr_secrets: BTreeMap<Key, ECRSecret>,
    secrets: BTreeMap<Key, Secret>,
    statuses: BTreeMap<Key, ECRSecretStatus>,
    creates: usize,
    replaces: usize,
    not_ready: bool,
    fail_namespace_listing: bool,
    fail_secret_listing: BTreeSet<String>,
    fail_writes: bool,
    fail_status: bool,
    listing_gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn insert_ecr_secret(&self, ecr_secret: ECRSecret) {
        let namespace = ecr_secret.namespace().unwrap_or_default();
        let mut state = self.state();
        state.namespaces.insert(namespace.clone());
        state
            .ecr_secrets
            .insert((namespace, ecr_secret.name_any()), ecr_secret);
    }

    pub(crate) fn remove_ecr_secret(&self, namespace: &str, name: &str) {
        self.state()
            .ecr_secrets
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub(crate) fn insert_secret(&self, secret: Secret) {
        let namespace = secret.namespace().unwrap_or_default();
        let mut state = self.state();
        state.namespaces.insert(namespace.clone());
        state.secrets.insert((namespace, secret.name_any()), secret);
    }

    pub(crate) fn add_namespace(&self, namespace: &str) {
        self.state().namespaces.insert(namespace.to_string());
    }

    pub(crate) fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub(crate) fn status(&self, namespace: &str, name: &str) -> Option<ECRSecretStatus> {
        self.state()
            .statuses
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub(crate) fn creates(&self) -> usize {
        self.state().creates
    }

    pub(crate) fn replaces(&self) -> usize {
        self.state().replaces
    }

    pub(crate) fn set_not_ready(&self, not_ready: bool) {
        self.state().not_ready = not_ready;
    }

    pub(crate) fn fail_namespace_listing(&self) {
        self.state().fail_namespace_listing = true;
    }

    pub(crate) fn fail_secret_listing(&self, namespace: &str) {
        self.state().fail_secret_listing.insert(namespace.to_string());
    }

    pub(crate) fn fail_writes(&self) {
        self.state().fail_writes = true;
    }

    pub(crate) fn fail_status(&self) {
        self.state().fail_status = true;
    }

    /// Hold the next namespace listing until the returned release is notified
    ///
    /// The first handle is notified once a listing has started.
    pub(crate) fn hold_listing(&self) -> (Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.state().listing_gate = Some((Arc::clone(&started), Arc::clone(&release)));
        (started, release)
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get_ecr_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ECRSecret>, StoreError> {
        Ok(self
            .state()
            .ecr_secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(StoreError::Rejected("writes disabled".to_string()));
        }
        let key = (namespace.to_string(), secret.name_any());
        if state.secrets.contains_key(&key) {
            return Err(StoreError::Rejected(format!("secret {} already exists", key.1)));
        }
        let mut stored = secret.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        stored.metadata.resource_version = Some("1".to_string());
        state.creates += 1;
        state.secrets.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace_secret(
        &self,
        namespace: &str,
        secret: &Secret,
    ) -> Result<Secret, StoreError> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(StoreError::Rejected("writes disabled".to_string()));
        }
        let key = (namespace.to_string(), secret.name_any());
        let Some(current) = state.secrets.get(&key) else {
            return Err(StoreError::Rejected(format!("secret {} not found", key.1)));
        };
        if current.metadata.resource_version != secret.metadata.resource_version {
            return Err(StoreError::Rejected(format!("secret {} was modified", key.1)));
        }
        let version = current
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_default();
        let mut stored = secret.clone();
        stored.metadata.resource_version = Some((version + 1).to_string());
        state.replaces += 1;
        state.secrets.insert(key, stored.clone());
        Ok(stored)
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ECRSecretStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_status {
            return Err(StoreError::Rejected("status writes disabled".to_string()));
        }
        state
            .statuses
            .insert((namespace.to_string(), name.to_string()), status.clone());
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError> {
        let gate = self.state().listing_gate.take();
        if let Some((started, release)) = gate {
            started.notify_one();
            release.notified().await;
        }

        let state = self.state();
        if state.not_ready {
            return Err(StoreError::NotReady);
        }
        if state.fail_namespace_listing {
            return Err(StoreError::Rejected("namespace listing refused".to_string()));
        }
        Ok(state.namespaces.iter().cloned().collect())
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, StoreError> {
        let state = self.state();
        if state.fail_secret_listing.contains(namespace) {
            return Err(StoreError::Rejected(format!(
                "secret listing refused in {namespace}"
            )));
        }
        Ok(state
            .secrets
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, secret)| secret.clone())
            .collect())
    }
}
