//! # Content Identity
//!
//! A managed secret carries a UUID derived from its payload and its expiry
//! and lifetime annotations. A secret whose recorded UUID no longer matches
//! the one recomputed from its current content has been edited outside the
//! controller and is regenerated.

use super::{
    annotation, docker_config_payload, ANNOTATION_EXPIRES, ANNOTATION_LIFETIME, ANNOTATION_UID,
};
use k8s_openapi::api::core::v1::Secret;
use uuid::Uuid;

/// MD5 of `payload ++ expires ++ lifetime`, read as a UUID
///
/// Returns the nil UUID when any input is missing. Inputs are concatenated
/// without separators.
#[must_use]
pub fn compute_content_uid(
    payload: Option<&[u8]>,
    expires: Option<&str>,
    lifetime: Option<&str>,
) -> Uuid {
    let (Some(payload), Some(expires), Some(lifetime)) = (payload, expires, lifetime) else {
        return Uuid::nil();
    };

    let mut buffer = Vec::with_capacity(payload.len() + expires.len() + lifetime.len());
    buffer.extend_from_slice(payload);
    buffer.extend_from_slice(expires.as_bytes());
    buffer.extend_from_slice(lifetime.as_bytes());

    Uuid::from_bytes(md5::compute(&buffer).0)
}

/// Content identity of a secret as it currently stands
#[must_use]
pub fn secret_content_uid(secret: &Secret) -> Uuid {
    compute_content_uid(
        docker_config_payload(secret),
        annotation(secret, ANNOTATION_EXPIRES),
        annotation(secret, ANNOTATION_LIFETIME),
    )
}

/// Whether a secret's content no longer matches its recorded identity
///
/// A secret is drifted if its identity cannot be computed, the identity
/// annotation is absent or unparsable, or the recorded value differs from
/// the recomputed one. Never fails.
#[must_use]
pub fn is_drifted(secret: &Secret) -> bool {
    let actual = secret_content_uid(secret);
    if actual.is_nil() {
        return true;
    }

    annotation(secret, ANNOTATION_UID)
        .and_then(|recorded| Uuid::parse_str(recorded).ok())
        .is_none_or(|recorded| recorded != actual)
}

/// Recompute the identity and record it in the identity annotation
///
/// Call after every write to the payload, expiry or lifetime.
pub fn stamp_content_uid(secret: &mut Secret) -> Uuid {
    let uid = secret_content_uid(secret);
    secret
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(ANNOTATION_UID.to_string(), uid.to_string());
    uid
}
