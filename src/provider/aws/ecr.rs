//! # Amazon ECR
//!
//! Issues registry tokens through `GetAuthorizationToken` using the static
//! access key pair configured for the registry's account.

use crate::config::Credentials;
use crate::provider::{AuthorizationToken, CredentialSource, ProviderError, TokenFetcher};
use async_trait::async_trait;
use aws_sdk_ecr::error::DisplayErrorContext;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Overrides the ECR endpoint, for local stacks and mock servers
pub const ECR_ENDPOINT_ENV: &str = "ECR_ENDPOINT";

const PROVIDER_NAME: &str = "ecr-secret-controller";

#[derive(Debug, Clone, Copy, Default)]
pub struct EcrCredentialSource;

#[async_trait]
impl CredentialSource for EcrCredentialSource {
    async fn configure(
        &self,
        credentials: &Credentials,
        region: &str,
    ) -> Result<Box<dyn TokenFetcher>, ProviderError> {
        let static_credentials = aws_credential_types::Credentials::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            None,
            None,
            PROVIDER_NAME,
        );

        let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .credentials_provider(static_credentials);

        if let Ok(endpoint) = std::env::var(ECR_ENDPOINT_ENV) {
            info!("Routing ECR requests to {}", endpoint);
            builder = builder.endpoint_url(&endpoint);
        }

        let sdk_config = builder.load().await;
        debug!(region = %region, "Configured ECR client");

        Ok(Box::new(EcrTokenFetcher {
            client: aws_sdk_ecr::Client::new(&sdk_config),
            region: region.to_string(),
        }))
    }
}

#[derive(Debug, Clone)]
pub struct EcrTokenFetcher {
    client: aws_sdk_ecr::Client,
    region: String,
}

#[async_trait]
impl TokenFetcher for EcrTokenFetcher {
    async fn fetch_token(&self) -> Result<AuthorizationToken, ProviderError> {
        let output = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| ProviderError::Fetch(DisplayErrorContext(&e).to_string()))?;

        let data = output
            .authorization_data()
            .first()
            .ok_or(ProviderError::IncompleteResponse("authorizationData"))?;

        let authorization_token = data
            .authorization_token()
            .ok_or(ProviderError::IncompleteResponse("authorizationToken"))?;
        let proxy_endpoint = data
            .proxy_endpoint()
            .ok_or(ProviderError::IncompleteResponse("proxyEndpoint"))?;
        let expires_at = data
            .expires_at()
            .and_then(|at| DateTime::<Utc>::from_timestamp(at.secs(), at.subsec_nanos()))
            .ok_or(ProviderError::IncompleteResponse("expiresAt"))?;

        debug!(
            region = %self.region,
            endpoint = %proxy_endpoint,
            expires = %expires_at,
            "Fetched ECR authorization token"
        );

        Ok(AuthorizationToken {
            authorization_token: authorization_token.to_string(),
            proxy_endpoint: proxy_endpoint.to_string(),
            expires_at,
        })
    }
}
