//! ECR Secret Controller Library
//!
//! This library provides the core functionality for the ECR Secret Controller:
//! the credential lifecycle engine that decides when a docker-registry secret
//! mirroring an ECR authorization token must be regenerated, and the runtime
//! that drives it from Kubernetes events and a periodic renewal sweep.
//! Tests are included in the module files.

pub mod clock;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod provider;
pub mod runtime;

// Re-export CRD types for convenience
pub use crd::*;
