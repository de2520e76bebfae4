//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Durations are plain millisecond integers; they are signed so that a
//! negative value is reported by validation instead of failing to parse.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProbeConfig {
    /// Timeout options the deadline context is built from.
    pub timeouts: TimeoutConfig,

    /// Connection pool settings.
    pub pool: PoolConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Timeout options, in milliseconds. Zero means unbounded.
///
/// Setting `timeout_ms` switches to the unified operation deadline; without it
/// the per-step timeouts apply.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Operation-wide deadline.
    pub timeout_ms: Option<i64>,

    /// Server selection timeout.
    pub server_selection_timeout_ms: Option<i64>,

    /// Connection checkout (wait queue) timeout.
    pub wait_queue_timeout_ms: Option<i64>,

    /// Socket timeout applied by the transport in per-step mode.
    pub socket_timeout_ms: Option<i64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            server_selection_timeout_ms: Some(30_000),
            wait_queue_timeout_ms: Some(0),
            socket_timeout_ms: Some(0),
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Address of the server the pool connects to.
    pub address: String,

    /// Maximum concurrent checked-out connections.
    pub max_connections: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            address: "localhost:27017".to_string(),
            max_connections: 10,
        }
    }
}

/// How a retry attempt is timed.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryDeadline {
    /// Retries share the original operation deadline.
    #[default]
    Shared,
    /// Every retry gets a fresh full budget.
    Fresh,
}

impl RetryDeadline {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RetryDeadline::Shared => "shared",
            RetryDeadline::Fresh => "fresh",
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Whether retries keep the original deadline.
    pub deadline: RetryDeadline,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            deadline: RetryDeadline::Shared,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Install a Prometheus recorder and report its snapshot.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
        }
    }
}
