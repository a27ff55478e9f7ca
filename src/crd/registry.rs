//! # Registry Reference
//!
//! Splits an ECR registry host into the account that owns it and the region
//! it lives in.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static REGISTRY_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<account>[0-9]{12})\.dkr\.ecr\.(?P<region>[a-z0-9-]+)\.amazonaws\.com(?:\.cn)?$")
        .expect("Failed to compile registry host regex - this should never happen")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("'{0}' is not an ECR registry host")]
    Invalid(String),
}

/// Account and region of an ECR registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRef {
    pub account_id: String,
    pub region: String,
}

impl RegistryRef {
    /// Parse `<account>.dkr.ecr.<region>.amazonaws.com`
    ///
    /// # Errors
    ///
    /// Returns an error if `registry` is not an ECR registry host.
    pub fn parse(registry: &str) -> Result<Self, RegistryError> {
        let caps = REGISTRY_HOST
            .captures(registry.trim())
            .ok_or_else(|| RegistryError::Invalid(registry.to_string()))?;
        Ok(Self {
            account_id: caps["account"].to_string(),
            region: caps["region"].to_string(),
        })
    }
}

impl fmt::Display for RegistryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.dkr.ecr.{}.amazonaws.com", self.account_id, self.region)
    }
}
