//! # Controller
//!
//! The credential lifecycle engine and the pieces that drive it.
//!
//! - `secret`: annotations, content identity, renewal decision and payload of managed secrets
//! - `reconciler`: brings one `ECRSecret` to a present, untampered and fresh pull secret
//! - `renewal`: periodic sweep that requests reconciles for ageing secrets
//! - `store`: reads and writes against the cluster
//! - `backoff`: retry delays for failed reconciles
//! - `server`: metrics and probes

pub mod backoff;
pub mod reconciler;
pub mod renewal;
pub mod secret;
pub mod server;
pub mod store;
