//! # Account Credentials
//!
//! Static AWS access keys per account, read from a TOML file keyed by
//! account ID:
//!
//! ```toml
//! [123456789012]
//! access_key = "AKIA..."
//! secret_key = "..."
//! ```
//!
//! The file is read on every use so that rotated keys are picked up without
//! a restart. Key material is wiped from memory when dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const ACCESS_KEY: &str = "access_key";
pub const SECRET_KEY: &str = "secret_key";

/// Access key pair for one account
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("FATAL: Cannot read configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("FATAL: Configuration file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("FATAL: Credentials for account '{0}' not present in configuration")]
    MissingAccount(String),
    #[error("FATAL: {}", missing_keys_message(.0))]
    MissingKeys(Vec<&'static str>),
}

fn missing_keys_message(keys: &[&'static str]) -> String {
    keys.iter()
        .map(|key| format!("'{key}' missing from config"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Extract the credentials of `account_id` from TOML text
///
/// # Errors
///
/// Returns an error if the text is not TOML, has no table for the account,
/// or the table lacks `access_key` or `secret_key`. All missing keys are
/// reported together.
pub fn parse_credentials(text: &str, account_id: &str) -> Result<Credentials, CredentialsError> {
    let mut accounts: BTreeMap<String, BTreeMap<String, String>> = toml::from_str(text)?;

    let Some(mut table) = accounts.remove(account_id) else {
        return Err(CredentialsError::MissingAccount(account_id.to_string()));
    };
    accounts.values_mut().for_each(|other| other.values_mut().for_each(Zeroize::zeroize));

    let access_key = table.remove(ACCESS_KEY);
    let secret_key = table.remove(SECRET_KEY);
    table.values_mut().for_each(Zeroize::zeroize);

    match (access_key, secret_key) {
        (Some(access_key), Some(secret_key)) => Ok(Credentials {
            access_key_id: access_key,
            secret_access_key: secret_key,
        }),
        (access_key, secret_key) => {
            let mut missing = Vec::new();
            if access_key.is_none() {
                missing.push(ACCESS_KEY);
            }
            if let Some(mut secret_key) = secret_key {
                secret_key.zeroize();
            } else {
                missing.push(SECRET_KEY);
            }
            if let Some(mut access_key) = access_key {
                access_key.zeroize();
            }
            Err(CredentialsError::MissingKeys(missing))
        }
    }
}

/// Read the credentials file and extract the credentials of `account_id`
///
/// # Errors
///
/// Returns an error if the file cannot be read, or as [`parse_credentials`].
pub async fn load_credentials(
    path: &Path,
    account_id: &str,
) -> Result<Credentials, CredentialsError> {
    let mut text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CredentialsError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let result = parse_credentials(&text, account_id);
    text.zeroize();
    result
}
