//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! RetryExecutor::execute(ctx, attempt_fn):
//!     → attempt 1 runs on the caller's context
//!     → on a retryable failure: backoff.rs computes the pause
//!     → shared policy: give up if the deadline would pass during the pause
//!     → attempt n runs on a context derived per the deadline policy
//! ```
//!
//! # Design Decisions
//! - Deadline failures are never retried
//! - Retries share the original deadline unless configured otherwise
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod retries;

pub use retries::{RetryExecutor, Retryable};
