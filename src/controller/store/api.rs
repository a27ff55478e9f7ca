use super::{ClusterStore, StoreError};
use crate::constants::FIELD_MANAGER;
use crate::controller::secret::DOCKER_CONFIG_TYPE;
use crate::crd::{ECRSecret, ECRSecretStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;

/// Cluster store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn ecr_secrets(&self, namespace: &str) -> Api<ECRSecret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_ecr_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ECRSecret>, StoreError> {
        Ok(self.ecr_secrets(namespace).get_opt(name).await?)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.secrets(namespace).get_opt(name).await?)
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError> {
        Ok(self
            .secrets(namespace)
            .create(&PostParams::default(), secret)
            .await?)
    }

    async fn replace_secret(
        &self,
        namespace: &str,
        secret: &Secret,
    ) -> Result<Secret, StoreError> {
        let name = secret
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| StoreError::Rejected("secret has no name".to_string()))?;
        Ok(self
            .secrets(namespace)
            .replace(name, &PostParams::default(), secret)
            .await?)
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ECRSecretStatus,
    ) -> Result<(), StoreError> {
        let patch = json!({ "status": status });
        self.ecr_secrets(namespace)
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        Ok(namespaces
            .list(&ListParams::default())
            .await?
            .items
            .iter()
            .map(ResourceExt::name_any)
            .collect())
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, StoreError> {
        let params = ListParams::default().fields(&format!("type={DOCKER_CONFIG_TYPE}"));
        Ok(self.secrets(namespace).list(&params).await?.items)
    }
}
