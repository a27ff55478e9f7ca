//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! command-line flags or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default requeue interval for reconciliation errors (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default exponential backoff starting value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before continuing after unknown watch stream errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default location of the per-account credential file
pub const DEFAULT_CONFIG_FILE: &str = "/etc/ecr-secret-operator/config.toml";

/// Default maximum age of a managed secret
pub const DEFAULT_MAX_AGE: &str = "6h";

/// Default interval between renewal sweeps
pub const DEFAULT_RENEWAL_INTERVAL: &str = "1m";

/// Default polling granularity of the renewal scheduler
pub const DEFAULT_RENEWAL_POLL: &str = "500ms";

/// Default capacity of the renewal notification channel
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 1024;

/// Field manager name used for status patches
pub const FIELD_MANAGER: &str = "ecr-secret-controller";
