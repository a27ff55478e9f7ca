//! # Secret Materialization
//!
//! Builds the payload and annotations of a managed secret from a freshly
//! issued authorization token.

use super::duration::{format_duration, round_to_minute};
use super::identity::stamp_content_uid;
use super::{ANNOTATION_EXPIRES, ANNOTATION_LIFETIME, ANNOTATION_UID, DOCKER_CONFIG_KEY};
use crate::clock::Clock;
use crate::provider::{ProviderError, TokenFetcher};
use chrono::SecondsFormat;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Annotations and data of a managed secret, before its identity is stamped
#[derive(Debug, Clone, PartialEq)]
pub struct SecretContent {
    pub annotations: BTreeMap<String, String>,
    pub data: BTreeMap<String, ByteString>,
}

/// `{"auths":{"<endpoint>":{"auth":"<token>"}}}`
#[must_use]
pub fn docker_config_json(endpoint: &str, auth: &str) -> Vec<u8> {
    let mut auths = serde_json::Map::new();
    auths.insert(endpoint.to_string(), json!({ "auth": auth }));
    json!({ "auths": serde_json::Value::Object(auths) })
        .to_string()
        .into_bytes()
}

/// Fetch a token and lay it out as secret content
///
/// The lifetime annotation is the time remaining until expiry, rounded to
/// the minute. The identity annotation holds the nil UUID until the
/// content is stamped.
///
/// # Errors
///
/// Returns the fetcher's error unchanged.
pub async fn build_payload(
    fetcher: &dyn TokenFetcher,
    clock: &dyn Clock,
) -> Result<SecretContent, ProviderError> {
    let token = fetcher.fetch_token().await?;
    let lifetime = round_to_minute(token.expires_at - clock.now());

    let annotations = BTreeMap::from([
        (
            ANNOTATION_EXPIRES.to_string(),
            token.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (ANNOTATION_UID.to_string(), Uuid::nil().to_string()),
        (
            ANNOTATION_LIFETIME.to_string(),
            format_duration(lifetime),
        ),
    ]);

    let data = BTreeMap::from([(
        DOCKER_CONFIG_KEY.to_string(),
        ByteString(docker_config_json(
            &token.proxy_endpoint,
            &token.authorization_token,
        )),
    )]);

    Ok(SecretContent { annotations, data })
}

/// Regenerate a secret's content in place and stamp its new identity
///
/// The annotation map is replaced wholesale. On error the secret is left
/// untouched.
///
/// # Errors
///
/// Returns the fetcher's error unchanged.
pub async fn apply_regeneration(
    secret: &mut Secret,
    fetcher: &dyn TokenFetcher,
    clock: &dyn Clock,
) -> Result<Uuid, ProviderError> {
    let content = build_payload(fetcher, clock).await?;
    secret.metadata.annotations = Some(content.annotations);
    secret.data = Some(content.data);
    Ok(stamp_content_uid(secret))
}
