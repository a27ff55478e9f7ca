//! # Fixed Credential Source
//!
//! Serves a canned authorization token, or fails at a chosen step, without
//! talking to any registry. Records every configuration request so callers
//! can check which account credentials and region were used.

use crate::config::Credentials;
use crate::provider::{AuthorizationToken, CredentialSource, ProviderError, TokenFetcher};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Registry endpoint of the canned token
pub const TEST_REGISTRY: &str = "123456789012.dkr.ecr.eu-west-1.amazonaws.com";

/// Expiry of the canned token
pub const TEST_EXPIRY: &str = "2023-01-01T12:00:00Z";

/// Lifetime annotation produced when the clock stands at expiry minus twelve hours
pub const VALID_LIFETIME: &str = "12h0m0s";

/// Canned token, base64 of `jdoe:pasword123`
pub const TEST_AUTH_DATA: &str = "amRvZTpwYXN3b3JkMTIz";

/// The token described by the `TEST_*` constants
#[must_use]
pub fn test_token() -> AuthorizationToken {
    AuthorizationToken {
        authorization_token: TEST_AUTH_DATA.to_string(),
        proxy_endpoint: TEST_REGISTRY.to_string(),
        expires_at: chrono::DateTime::parse_from_rfc3339(TEST_EXPIRY)
            .map(|at| at.with_timezone(&chrono::Utc))
            .unwrap_or_default(),
    }
}

/// Step at which a [`FixedCredentialSource`] fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Configure,
    Fetch,
}

/// Account access key and region of one configuration request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub access_key_id: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct FixedCredentialSource {
    token: Arc<Mutex<AuthorizationToken>>,
    failure: Option<FailurePoint>,
    requests: Arc<Mutex<Vec<ConfigureRequest>>>,
}

impl FixedCredentialSource {
    #[must_use]
    pub fn new(token: AuthorizationToken) -> Self {
        Self {
            token: Arc::new(Mutex::new(token)),
            failure: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A source that fails at `failure`
    #[must_use]
    pub fn failing(failure: FailurePoint) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(test_token())
        }
    }

    /// Replace the token served by fetchers configured from now on
    pub fn set_token(&self, token: AuthorizationToken) {
        match self.token.lock() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    /// Configuration requests seen so far
    #[must_use]
    pub fn requests(&self) -> Vec<ConfigureRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn current_token(&self) -> AuthorizationToken {
        match self.token.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for FixedCredentialSource {
    fn default() -> Self {
        Self::new(test_token())
    }
}

#[async_trait]
impl CredentialSource for FixedCredentialSource {
    async fn configure(
        &self,
        credentials: &Credentials,
        region: &str,
    ) -> Result<Box<dyn TokenFetcher>, ProviderError> {
        let request = ConfigureRequest {
            access_key_id: credentials.access_key_id().to_string(),
            region: region.to_string(),
        };
        match self.requests.lock() {
            Ok(mut guard) => guard.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }

        if self.failure == Some(FailurePoint::Configure) {
            return Err(ProviderError::Configure {
                region: region.to_string(),
                message: "configuration refused".to_string(),
            });
        }

        Ok(Box::new(FixedTokenFetcher {
            token: self.current_token(),
            fail: self.failure == Some(FailurePoint::Fetch),
        }))
    }
}

#[derive(Debug, Clone)]
pub struct FixedTokenFetcher {
    token: AuthorizationToken,
    fail: bool,
}

impl FixedTokenFetcher {
    #[must_use]
    pub fn new(token: AuthorizationToken) -> Self {
        Self { token, fail: false }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            token: test_token(),
            fail: true,
        }
    }
}

#[async_trait]
impl TokenFetcher for FixedTokenFetcher {
    async fn fetch_token(&self) -> Result<AuthorizationToken, ProviderError> {
        if self.fail {
            return Err(ProviderError::Fetch("token request refused".to_string()));
        }
        Ok(self.token.clone())
    }
}
