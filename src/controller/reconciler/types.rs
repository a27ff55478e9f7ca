//! # Reconciler Types
//!
//! Shared state of the reconciler, its errors, and the outcome of one pass.

use crate::clock::Clock;
use crate::config::CredentialsError;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::store::{ClusterStore, StoreError};
use crate::crd::RegistryError;
use crate::provider::{CredentialSource, ProviderError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Credentials file unusable; the process cannot make progress
    #[error(transparent)]
    Configuration(#[from] CredentialsError),
    #[error("invalid registry: {0}")]
    InvalidRegistry(#[from] RegistryError),
    #[error("credential source error: {0}")]
    Provider(#[from] ProviderError),
    #[error("cluster store error: {0}")]
    Store(#[from] StoreError),
    #[error("ECRSecret {0} has no uid and cannot own a secret")]
    MissingOwnerUid(String),
}

impl ReconcilerError {
    /// Whether the controller must stop
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Short label for metrics
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::InvalidRegistry(_) => "invalid-registry",
            Self::Provider(_) => "provider",
            Self::Store(_) => "store",
            Self::MissingOwnerUid(_) => "missing-owner-uid",
        }
    }
}

/// Why an existing secret was rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerationReason {
    /// Content no longer matches its recorded identity
    Drift,
    /// Token is older than the maximum secret age
    Renewal,
    /// Expiry or lifetime annotation cannot be interpreted
    Malformed,
}

impl RegenerationReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drift => "drift",
            Self::Renewal => "renewal",
            Self::Malformed => "malformed",
        }
    }
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created {
        secret: String,
        uid: Uuid,
    },
    Regenerated {
        secret: String,
        uid: Uuid,
        reason: RegenerationReason,
    },
    NoOp,
}

/// Per-resource error backoff
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(1, 10),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared context of every reconciliation
#[derive(Debug)]
pub struct Reconciler {
    pub store: Arc<dyn ClusterStore>,
    pub source: Arc<dyn CredentialSource>,
    pub clock: Arc<dyn Clock>,
    /// Credentials file, read on every pass
    pub config_file: PathBuf,
    pub max_age: chrono::Duration,
    /// Backoff per `namespace/name`
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn ClusterStore>,
        source: Arc<dyn CredentialSource>,
        clock: Arc<dyn Clock>,
        config_file: PathBuf,
        max_age: chrono::Duration,
    ) -> Self {
        Self {
            store,
            source,
            clock,
            config_file,
            max_age,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the error history of a resource after a successful pass
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}
