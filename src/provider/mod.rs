//! # Credential Sources
//!
//! A credential source turns per-account static credentials and a region
//! into a token fetcher. A fetcher returns a short-lived registry
//! authorization token along with the registry endpoint it is valid for and
//! its absolute expiry.
//!
//! - `aws`: Amazon ECR `GetAuthorizationToken`
//! - `fixed`: canned tokens and scripted failures for tests and local runs

pub mod aws;
pub mod fixed;

use crate::config::Credentials;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Registry authorization token as issued by the credential source
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationToken {
    /// Opaque token placed verbatim in the docker config `auth` field
    pub authorization_token: String,
    /// Registry endpoint the token is valid for
    pub proxy_endpoint: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AuthorizationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationToken")
            .field("authorization_token", &"<redacted>")
            .field("proxy_endpoint", &self.proxy_endpoint)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to configure credential source for region '{region}': {message}")]
    Configure { region: String, message: String },
    #[error("failed to fetch authorization token: {0}")]
    Fetch(String),
    #[error("authorization token response is missing '{0}'")]
    IncompleteResponse(&'static str),
}

/// Fetches authorization tokens for one account and region
#[async_trait]
pub trait TokenFetcher: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// Returns an error if the source rejects the request or answers with
    /// an incomplete token.
    async fn fetch_token(&self) -> Result<AuthorizationToken, ProviderError>;
}

/// Builds token fetchers from static credentials
#[async_trait]
pub trait CredentialSource: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// Returns an error if a client for `region` cannot be built.
    async fn configure(
        &self,
        credentials: &Credentials,
        region: &str,
    ) -> Result<Box<dyn TokenFetcher>, ProviderError>;
}
