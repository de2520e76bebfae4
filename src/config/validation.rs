//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject negative timeouts and option sets no context strategy accepts
//! - Validate value ranges (pool size, attempts, backoff bounds)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProbeConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::{ProbeConfig, TimeoutConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("timeouts.{field} must be non-negative, got {value}")]
    NegativeTimeout { field: &'static str, value: i64 },

    #[error(
        "timeouts must set timeout_ms and server_selection_timeout_ms, \
         or server_selection_timeout_ms and wait_queue_timeout_ms"
    )]
    UnrecognizedTimeoutShape,

    #[error("pool.max_connections must be greater than zero")]
    EmptyPool,

    #[error("retries.max_attempts must be at least 1")]
    NoAttempts,

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    BackoffRange { base: u64, max: u64 },

    #[error("unknown log level '{0}'")]
    LogLevel(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProbeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_timeouts(&config.timeouts, &mut errors);

    if config.pool.max_connections == 0 {
        errors.push(ValidationError::EmptyPool);
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::NoAttempts);
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::BackoffRange {
            base: retries.base_delay_ms,
            max: retries.max_delay_ms,
        });
    }

    if config.observability.log_level.parse::<tracing::Level>().is_err() {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_timeouts(timeouts: &TimeoutConfig, errors: &mut Vec<ValidationError>) {
    let fields = [
        ("timeout_ms", timeouts.timeout_ms),
        ("server_selection_timeout_ms", timeouts.server_selection_timeout_ms),
        ("wait_queue_timeout_ms", timeouts.wait_queue_timeout_ms),
        ("socket_timeout_ms", timeouts.socket_timeout_ms),
    ];
    for (field, value) in fields {
        if let Some(value) = value.filter(|v| *v < 0) {
            errors.push(ValidationError::NegativeTimeout { field, value });
        }
    }

    let selection = timeouts.server_selection_timeout_ms.is_some();
    let unified = timeouts.timeout_ms.is_some() && selection;
    let per_step = selection && timeouts.wait_queue_timeout_ms.is_some();
    if !unified && !per_step {
        errors.push(ValidationError::UnrecognizedTimeoutShape);
    }
}
