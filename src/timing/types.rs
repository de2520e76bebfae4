//! Error taxonomy and phase labels shared by delays and contexts.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias for deadline operations.
pub type DeadlineResult<T> = Result<T, DeadlineError>;

/// Errors raised by delays, contexts and the context factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeadlineError {
    /// A delay fired, or an expired delay/context was checked.
    #[error("{message}")]
    DeadlineExceeded { message: String, duration: Duration },

    /// Bad timeout values, e.g. a negative duration.
    #[error("invalid timeout configuration: {0}")]
    InvalidConfiguration(String),

    /// The factory saw neither the unified nor the per-step option shape.
    #[error("unrecognized timeout options: {0}")]
    UnrecognizedOptionsShape(String),

    /// The checkout delay was read before the selection delay was resolved.
    #[error("connection checkout delay requested before server selection delay was resolved")]
    SelectionNotResolved,
}

impl DeadlineError {
    /// DeadlineExceeded with the default "Expired after Nms" message.
    pub fn expired_after(duration: Duration) -> Self {
        Self::exceeded(format!("Expired after {}ms", duration.as_millis()), duration)
    }

    pub fn exceeded(message: impl Into<String>, duration: Duration) -> Self {
        DeadlineError::DeadlineExceeded {
            message: message.into(),
            duration,
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, DeadlineError::DeadlineExceeded { .. })
    }

    /// True for `InvalidConfiguration` and its `UnrecognizedOptionsShape` sub-case.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(
            self,
            DeadlineError::InvalidConfiguration(_) | DeadlineError::UnrecognizedOptionsShape(_)
        )
    }

    /// The budget that was exceeded, for `DeadlineExceeded`.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            DeadlineError::DeadlineExceeded { duration, .. } => Some(*duration),
            _ => None,
        }
    }
}

/// Step of an operation a delay is bounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    ServerSelection,
    ConnectionCheckout,
    SocketWrite,
    SocketRead,
    /// The operation as a whole (retry gaps, explicit checks).
    Operation,
}

impl Phase {
    /// Label used in logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Phase::ServerSelection => "server_selection",
            Phase::ConnectionCheckout => "connection_checkout",
            Phase::SocketWrite => "socket_write",
            Phase::SocketRead => "socket_read",
            Phase::Operation => "operation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
