//! # Custom Resource Definitions
//!
//! The `ECRSecret` resource declares that a namespace wants a docker-registry
//! pull secret for one ECR registry. The controller creates the secret,
//! owns it, and keeps its token fresh.

mod registry;

pub use registry::{RegistryError, RegistryRef};

use kube::CustomResource;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

/// Pattern accepted for `spec.registry`
pub const REGISTRY_PATTERN: &str = r"^\d{12}\.dkr\.ecr\.(ap|ca|eu|sa|us(-gov)?)-(east|northeast|southeast|north|south|central|west)-\d\.amazonaws\.com$";

/// Pattern accepted for `spec.secretName`
pub const SECRET_NAME_PATTERN: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$";

/// ECRSecret Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: secrets.fireflycons.io/v1beta1
/// kind: ECRSecret
/// metadata:
///   name: registry
///   namespace: default
/// spec:
///   registry: 123456789012.dkr.ecr.eu-west-1.amazonaws.com
///   secretName: registry-pull
/// ```
///
/// Without `secretName` the managed secret is named `<metadata.name>-secret`.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ECRSecret",
    group = "secrets.fireflycons.io",
    version = "v1beta1",
    namespaced,
    status = "ECRSecretStatus",
    shortname = "ecrs",
    printcolumn = r#"{"name":"Registry", "type":"string", "jsonPath":".spec.registry"}, {"name":"Last Updated", "type":"string", "jsonPath":".status.lastUpdated"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ECRSecretSpec {
    /// ECR registry host, `<account>.dkr.ecr.<region>.amazonaws.com`
    #[serde(default)]
    #[schemars(schema_with = "registry_schema")]
    pub registry: String,
    /// Name of the managed secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "secret_name_schema")]
    pub secret_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ECRSecretStatus {
    /// RFC3339 time the managed secret was last written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

fn registry_schema(_gen: &mut SchemaGenerator) -> Schema {
    let schema_value = serde_json::json!({
        "type": "string",
        "pattern": REGISTRY_PATTERN,
        "description": "ECR registry host, <account>.dkr.ecr.<region>.amazonaws.com"
    });
    Schema::try_from(schema_value).expect("Failed to create Schema for registry")
}

fn secret_name_schema(_gen: &mut SchemaGenerator) -> Schema {
    let schema_value = serde_json::json!({
        "type": "string",
        "maxLength": 253,
        "pattern": SECRET_NAME_PATTERN,
        "description": "Name of the managed secret. Defaults to <metadata.name>-secret"
    });
    Schema::try_from(schema_value).expect("Failed to create Schema for secretName")
}
