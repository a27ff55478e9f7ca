//! # Secret Lifecycle Tests
//!
//! Exercises the public lifecycle API end to end against a canned token:
//! - Content identity determinism
//! - Drift detection after regeneration and after tampering
//! - The renewal boundary
//! - Ownerless and unmanaged secrets

use chrono::{DateTime, Duration, Utc};
use ecr_secret_controller::clock::FixedClock;
use ecr_secret_controller::controller::secret::{
    annotation, apply_regeneration, compute_content_uid, docker_config_payload, is_drifted,
    is_renewal_due, renewal_status, RenewalStatus, ANNOTATION_EXPIRES, ANNOTATION_LIFETIME,
    ANNOTATION_UID, DOCKER_CONFIG_KEY,
};
use ecr_secret_controller::provider::fixed::{
    test_token, FixedTokenFetcher, TEST_EXPIRY, VALID_LIFETIME,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use uuid::Uuid;

fn at(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .unwrap()
        .with_timezone(&Utc)
}

fn owner() -> OwnerReference {
    OwnerReference {
        api_version: "secrets.fireflycons.io/v1beta1".to_string(),
        kind: "ECRSecret".to_string(),
        name: "registry".to_string(),
        uid: "0b6f5c1e-3d2a-4d8e-9f61-1c2b3a4d5e6f".to_string(),
        controller: Some(true),
        ..OwnerReference::default()
    }
}

fn owned_secret() -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some("registry-secret".to_string()),
            namespace: Some("apps".to_string()),
            owner_references: Some(vec![owner()]),
            ..ObjectMeta::default()
        },
        ..Secret::default()
    }
}

/// Clock twelve hours before the canned token expires
fn clock() -> FixedClock {
    FixedClock::new(at(TEST_EXPIRY) - Duration::hours(12))
}

async fn regenerated_secret() -> Secret {
    let mut secret = owned_secret();
    apply_regeneration(&mut secret, &FixedTokenFetcher::new(test_token()), &clock())
        .await
        .unwrap();
    secret
}

#[test]
fn test_content_uid_is_deterministic() {
    let first = compute_content_uid(Some(b"payload"), Some(TEST_EXPIRY), Some(VALID_LIFETIME));
    let second = compute_content_uid(Some(b"payload"), Some(TEST_EXPIRY), Some(VALID_LIFETIME));
    assert_eq!(first, second);
    assert!(!first.is_nil());
}

#[test]
fn test_content_uid_changes_with_each_input() {
    let base = compute_content_uid(Some(b"payload"), Some(TEST_EXPIRY), Some(VALID_LIFETIME));
    let variants = [
        compute_content_uid(Some(b"payloaD"), Some(TEST_EXPIRY), Some(VALID_LIFETIME)),
        compute_content_uid(
            Some(b"payload"),
            Some("2023-01-01T12:00:01Z"),
            Some(VALID_LIFETIME),
        ),
        compute_content_uid(Some(b"payload"), Some(TEST_EXPIRY), Some("11h59m0s")),
    ];

    for variant in variants {
        assert_ne!(variant, base);
    }
}

#[test]
fn test_content_uid_is_nil_when_an_input_is_missing() {
    assert!(compute_content_uid(None, Some(TEST_EXPIRY), Some(VALID_LIFETIME)).is_nil());
    assert!(compute_content_uid(Some(b"payload"), None, Some(VALID_LIFETIME)).is_nil());
    assert!(compute_content_uid(Some(b"payload"), Some(TEST_EXPIRY), None).is_nil());
}

#[tokio::test]
async fn test_regeneration_fills_every_field() {
    let secret = regenerated_secret().await;

    assert_eq!(annotation(&secret, ANNOTATION_EXPIRES), Some(TEST_EXPIRY));
    assert_eq!(annotation(&secret, ANNOTATION_LIFETIME), Some(VALID_LIFETIME));
    let uid = annotation(&secret, ANNOTATION_UID)
        .and_then(|uid| Uuid::parse_str(uid).ok())
        .unwrap();
    assert!(!uid.is_nil());
    assert!(docker_config_payload(&secret).is_some());
}

#[tokio::test]
async fn test_payload_carries_registry_login() {
    use base64::Engine;

    let secret = regenerated_secret().await;
    let document: serde_json::Value =
        serde_json::from_slice(docker_config_payload(&secret).unwrap()).unwrap();
    let auth = document["auths"][test_token().proxy_endpoint]["auth"]
        .as_str()
        .unwrap();

    let login = base64::engine::general_purpose::STANDARD.decode(auth).unwrap();
    assert_eq!(login, b"jdoe:pasword123");
}

#[tokio::test]
async fn test_regenerated_secret_is_not_drifted() {
    assert!(!is_drifted(&regenerated_secret().await));
}

#[tokio::test]
async fn test_tampering_with_payload_is_drift() {
    let mut secret = regenerated_secret().await;
    secret.data.as_mut().unwrap().insert(
        DOCKER_CONFIG_KEY.to_string(),
        ByteString(br#"{"auths":{}}"#.to_vec()),
    );
    assert!(is_drifted(&secret));
}

#[tokio::test]
async fn test_tampering_with_any_annotation_is_drift() {
    for (key, value) in [
        (ANNOTATION_EXPIRES, "2024-01-01T12:00:00Z"),
        (ANNOTATION_LIFETIME, "11h0m0s"),
        (ANNOTATION_UID, "not-a-uuid"),
    ] {
        let mut secret = regenerated_secret().await;
        secret
            .metadata
            .annotations
            .as_mut()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        assert!(is_drifted(&secret), "editing {key} should be drift");
    }
}

#[tokio::test]
async fn test_drift_regeneration_replaces_everything_together() {
    let mut secret = regenerated_secret().await;
    let stale_uid = annotation(&secret, ANNOTATION_UID).unwrap().to_string();
    secret.data.as_mut().unwrap().insert(
        DOCKER_CONFIG_KEY.to_string(),
        ByteString(b"tampered".to_vec()),
    );
    assert!(is_drifted(&secret));

    let fetcher = FixedTokenFetcher::new(test_token());
    let clock = clock();
    clock.advance(Duration::hours(1));
    apply_regeneration(&mut secret, &fetcher, &clock).await.unwrap();

    assert!(!is_drifted(&secret));
    assert_eq!(annotation(&secret, ANNOTATION_LIFETIME), Some("11h0m0s"));
    assert_ne!(annotation(&secret, ANNOTATION_UID), Some(stale_uid.as_str()));
    assert_ne!(docker_config_payload(&secret), Some(b"tampered".as_slice()));
}

#[tokio::test]
async fn test_renewal_boundary() {
    let secret = regenerated_secret().await;
    let max_age = Duration::hours(6);
    // 12:00 + (6h - 12h)
    let horizon = at("2023-01-01T06:00:00Z");

    assert!(!is_renewal_due(&secret, max_age, horizon - Duration::seconds(1)));
    assert!(!is_renewal_due(&secret, max_age, horizon));
    assert!(is_renewal_due(&secret, max_age, horizon + Duration::seconds(1)));
}

#[tokio::test]
async fn test_ownerless_secret_is_never_renewed() {
    let mut secret = regenerated_secret().await;
    secret.metadata.owner_references = None;

    let long_after = at(TEST_EXPIRY) + Duration::days(365);
    assert!(!is_renewal_due(&secret, Duration::hours(6), long_after));
    assert_eq!(
        renewal_status(&secret, Duration::hours(6), long_after),
        RenewalStatus::Orphaned
    );
}

#[test]
fn test_unmanaged_secret_is_ignored() {
    let secret = owned_secret();
    let long_after = at(TEST_EXPIRY) + Duration::days(365);
    assert!(!is_renewal_due(&secret, Duration::hours(6), long_after));
    assert_eq!(
        renewal_status(&secret, Duration::hours(6), long_after),
        RenewalStatus::Unmanaged
    );
}
