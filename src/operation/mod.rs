//! Operation execution.
//!
//! # Data Flow
//! ```text
//! OperationRunner::run(ctx, selection, command)
//!     → pipeline::select_server   (selection delay)
//!     → ConnectionPool::check_out (checkout delay)
//!     → pipeline::execute_command (budget attached, socket delays)
//!     → rtt.rs records the round trip
//! ```
//!
//! # Design Decisions
//! - Every phase reads its delay from the shared context right before it
//!   starts, so time spent in earlier phases is already accounted for
//! - Deadline failures carry the phase they happened in

pub mod pipeline;
pub mod rtt;
pub mod transport;

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::pool::CheckoutError;
use crate::resilience::retries::Retryable;
use crate::timing::{DeadlineError, Phase};

pub use pipeline::{execute_command, select_server, CommandOptions, OperationRunner};
pub use rtt::RoundTripSampler;
pub use transport::{SimulatedTransport, Transport};

/// Errors from running an operation.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{phase} exceeded the operation deadline: {source}")]
    Timeout {
        phase: Phase,
        #[source]
        source: DeadlineError,
    },

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("socket timed out after {}ms", .0.as_millis())]
    SocketTimeout(Duration),

    #[error("{phase} failed: {source}")]
    Io {
        phase: Phase,
        #[source]
        source: io::Error,
    },

    /// Not enough of the operation deadline left to back off and retry.
    #[error("Timed out before retry attempt {attempt}")]
    RetryDeadline {
        attempt: u32,
        #[source]
        last: Box<OperationError>,
    },
}

impl OperationError {
    /// True for any failure caused by a deadline or timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            OperationError::Timeout { .. }
            | OperationError::SocketTimeout(_)
            | OperationError::RetryDeadline { .. } => true,
            OperationError::Checkout(err) => err.is_timeout(),
            OperationError::Io { .. } => false,
        }
    }

    /// The phase the operation was in when it failed, when known.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            OperationError::Timeout { phase, .. } | OperationError::Io { phase, .. } => Some(*phase),
            OperationError::Checkout(_) => Some(Phase::ConnectionCheckout),
            OperationError::SocketTimeout(_) => Some(Phase::SocketRead),
            OperationError::RetryDeadline { .. } => None,
        }
    }
}

impl Retryable for OperationError {
    fn is_retryable(&self) -> bool {
        match self {
            OperationError::Io { .. } | OperationError::SocketTimeout(_) => true,
            OperationError::Checkout(CheckoutError::WaitQueueTimeout { .. }) => true,
            _ => false,
        }
    }
}
