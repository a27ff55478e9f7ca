//! # AWS Provider
//!
//! Amazon ECR credential source.

mod ecr;

pub use ecr::{EcrCredentialSource, EcrTokenFetcher, ECR_ENDPOINT_ENV};
