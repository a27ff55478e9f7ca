//! # Cluster Store
//!
//! The reads and writes the controller performs against the cluster: the
//! declared `ECRSecret` resources, the secrets they own, and the namespaces
//! the renewal sweep walks.

mod api;
#[cfg(test)]
pub(crate) mod memory;

pub use api::KubeStore;

use crate::crd::{ECRSecret, ECRSecretStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The API server cache is still warming up; retry later
    #[error("cluster store is not ready")]
    NotReady,
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match &error {
            kube::Error::Api(response)
                if response.code == 503
                    || (response.code == 429
                        && response.message.contains("storage is (re)initializing")) =>
            {
                Self::NotReady
            }
            _ => Self::Kube(error),
        }
    }
}

#[async_trait]
pub trait ClusterStore: Send + Sync + std::fmt::Debug {
    async fn get_ecr_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ECRSecret>, StoreError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError>;

    /// Replace a secret as a whole, guarded by its resource version
    async fn replace_secret(&self, namespace: &str, secret: &Secret)
        -> Result<Secret, StoreError>;

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ECRSecretStatus,
    ) -> Result<(), StoreError>;

    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError>;

    /// Docker config secrets in a namespace
    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, StoreError>;
}
