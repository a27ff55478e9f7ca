//! # Renewal Decision
//!
//! A token issued with lifetime `L` and expiring at `E` was issued at `E - L`.
//! Allowing a maximum secret age `A`, renewal is due once `E - L + A` has
//! passed. The comparison is strict: a secret is not due at exactly that
//! instant.

use super::duration::parse_duration;
use super::{annotation, ANNOTATION_EXPIRES, ANNOTATION_LIFETIME};
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::Secret;
use std::fmt;

/// Why a managed secret's annotations could not be interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedAnnotation {
    /// Expiry annotation is not RFC3339
    Expires(String),
    /// Lifetime annotation is absent
    MissingLifetime,
    /// Lifetime annotation is not a duration
    Lifetime(String),
    /// Renewal instant falls outside the representable range
    OutOfRange,
}

impl fmt::Display for MalformedAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expires(value) => write!(f, "unparsable expiry annotation '{value}'"),
            Self::MissingLifetime => write!(f, "lifetime annotation missing"),
            Self::Lifetime(value) => write!(f, "unparsable lifetime annotation '{value}'"),
            Self::OutOfRange => write!(f, "renewal instant out of range"),
        }
    }
}

/// Classification of a secret against the renewal policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalStatus {
    /// No expiry annotation, so not a secret this controller manages
    Unmanaged,
    /// No owner references
    Orphaned,
    /// Renewal instant not yet passed
    Fresh { renew_after: DateTime<Utc> },
    /// Renewal instant passed
    Due { renew_after: DateTime<Utc> },
    /// Annotations unusable; renewed to restore a well-formed secret
    Malformed(MalformedAnnotation),
}

impl RenewalStatus {
    #[must_use]
    pub fn is_renewal_due(&self) -> bool {
        matches!(self, Self::Due { .. } | Self::Malformed(_))
    }
}

/// Classify a secret against the renewal policy at `now`
#[must_use]
pub fn renewal_status(secret: &Secret, max_age: Duration, now: DateTime<Utc>) -> RenewalStatus {
    let Some(expires) = annotation(secret, ANNOTATION_EXPIRES) else {
        return RenewalStatus::Unmanaged;
    };

    if secret
        .metadata
        .owner_references
        .as_ref()
        .is_none_or(Vec::is_empty)
    {
        return RenewalStatus::Orphaned;
    }

    let expires = match DateTime::parse_from_rfc3339(expires) {
        Ok(expires) => expires.with_timezone(&Utc),
        Err(_) => {
            return RenewalStatus::Malformed(MalformedAnnotation::Expires(expires.to_string()))
        }
    };

    let Some(lifetime) = annotation(secret, ANNOTATION_LIFETIME) else {
        return RenewalStatus::Malformed(MalformedAnnotation::MissingLifetime);
    };
    let Ok(lifetime) = parse_duration(lifetime) else {
        return RenewalStatus::Malformed(MalformedAnnotation::Lifetime(lifetime.to_string()));
    };

    let Some(renew_after) = max_age
        .checked_sub(&lifetime)
        .and_then(|offset| expires.checked_add_signed(offset))
    else {
        return RenewalStatus::Malformed(MalformedAnnotation::OutOfRange);
    };

    if now > renew_after {
        RenewalStatus::Due { renew_after }
    } else {
        RenewalStatus::Fresh { renew_after }
    }
}

/// Whether a secret must be regenerated at `now`
///
/// False for secrets without an expiry annotation or without owners. True
/// when the annotations cannot be interpreted, or when `now` is strictly
/// past `expires + (max_age - lifetime)`.
#[must_use]
pub fn is_renewal_due(secret: &Secret, max_age: Duration, now: DateTime<Utc>) -> bool {
    renewal_status(secret, max_age, now).is_renewal_due()
}
