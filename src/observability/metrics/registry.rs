use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Register every controller metric with the registry
///
/// # Errors
///
/// Returns an error if a metric is registered twice.
pub fn register_metrics() -> Result<()> {
    super::controller_metrics::register_controller_metrics()?;
    super::renewal_metrics::register_renewal_metrics()?;
    Ok(())
}

/// Registry contents in the Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
