//! # Managed Secret
//!
//! Everything the controller knows about the docker-registry secrets it owns:
//! the annotation keys and payload layout, the content identity stamped on
//! each secret, the renewal decision, and regeneration of the payload from a
//! fresh authorization token.

pub mod duration;
pub mod expiry;
pub mod identity;
pub mod materialize;

pub use duration::{
    format_duration, parse_duration, round_duration, round_to_minute, DurationParseError,
};
pub use expiry::{is_renewal_due, renewal_status, MalformedAnnotation, RenewalStatus};
pub use identity::{compute_content_uid, is_drifted, secret_content_uid, stamp_content_uid};
pub use materialize::{apply_regeneration, build_payload, docker_config_json, SecretContent};

use crate::crd::ECRSecret;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

/// Annotation holding the content identity of the secret
pub const ANNOTATION_UID: &str = "secrets.fireflycons.io/uuid";

/// Annotation holding the RFC3339 expiry instant of the embedded token
pub const ANNOTATION_EXPIRES: &str = "secrets.fireflycons.io/expires";

/// Annotation holding the token lifetime observed at issue, rounded to the minute
pub const ANNOTATION_LIFETIME: &str = "secrets.fireflycons.io/validity";

/// Data key carrying the docker config document
pub const DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";

/// Secret type of docker-registry pull secrets
pub const DOCKER_CONFIG_TYPE: &str = "kubernetes.io/dockerconfigjson";

/// Value of an annotation, if present
#[must_use]
pub fn annotation<'a>(secret: &'a Secret, key: &str) -> Option<&'a str> {
    secret
        .metadata
        .annotations
        .as_ref()?
        .get(key)
        .map(String::as_str)
}

/// Raw bytes stored under the docker config key, if present
#[must_use]
pub fn docker_config_payload(secret: &Secret) -> Option<&[u8]> {
    secret
        .data
        .as_ref()?
        .get(DOCKER_CONFIG_KEY)
        .map(|bytes| bytes.0.as_slice())
}

/// First owner reference that points at an `ECRSecret`
#[must_use]
pub fn ecr_secret_owner(secret: &Secret) -> Option<&OwnerReference> {
    let kind = ECRSecret::kind(&());
    let api_version = ECRSecret::api_version(&());
    secret
        .metadata
        .owner_references
        .as_deref()?
        .iter()
        .find(|owner| owner.kind == kind && owner.api_version == api_version)
}
