//! # Configuration
//!
//! Operator settings from flags and environment, and per-account AWS
//! credentials from the credentials file.

pub mod controller;
pub mod credentials;

pub use controller::ControllerConfig;
pub use credentials::{load_credentials, parse_credentials, Credentials, CredentialsError};
