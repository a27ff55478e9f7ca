//! # Controller Configuration
//!
//! Command-line flags, each with an environment variable fallback.

use crate::constants;
use crate::controller::secret::{parse_duration, DurationParseError};
use clap::Parser;
use std::path::PathBuf;

/// Keeps ECR pull secrets fresh in every namespace
#[derive(Parser, Debug, Clone)]
#[command(name = "ecr-secret-controller", version, long_about = None)]
pub struct ControllerConfig {
    /// TOML file holding access keys per AWS account
    #[arg(long, env = "ECR_SECRET_CONFIG_FILE", default_value = constants::DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Maximum age of a pull secret before it is renewed
    #[arg(long, env = "ECR_SECRET_MAX_AGE", default_value = constants::DEFAULT_MAX_AGE, value_parser = parse_age)]
    pub max_age: chrono::Duration,

    /// Interval between renewal sweeps
    #[arg(long, env = "ECR_SECRET_RENEWAL_INTERVAL", default_value = constants::DEFAULT_RENEWAL_INTERVAL, value_parser = parse_interval)]
    pub renewal_interval: std::time::Duration,

    /// How often the renewal scanner checks for cancellation and sweep time
    #[arg(long, env = "ECR_SECRET_RENEWAL_POLL", default_value = constants::DEFAULT_RENEWAL_POLL, value_parser = parse_interval)]
    pub renewal_poll: std::time::Duration,

    /// Capacity of the queue from the renewal scanner to the controller
    #[arg(long, env = "ECR_SECRET_NOTIFICATION_BUFFER", default_value_t = constants::DEFAULT_NOTIFICATION_BUFFER)]
    pub notification_buffer: usize,

    /// Port of the metrics and probe server
    #[arg(long, env = "METRICS_PORT", default_value_t = constants::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::parse_from(["ecr-secret-controller"])
    }
}

fn parse_age(text: &str) -> Result<chrono::Duration, DurationParseError> {
    parse_duration(text)
}

fn parse_interval(text: &str) -> Result<std::time::Duration, String> {
    let duration = parse_duration(text).map_err(|e| e.to_string())?;
    if duration <= chrono::Duration::zero() {
        return Err(format!("interval '{text}' must be positive"));
    }
    duration.to_std().map_err(|e| e.to_string())
}
