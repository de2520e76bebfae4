//! Operation deadline context.
//!
//! Bounds every step of a database-style operation (server selection,
//! connection checkout, socket write, socket read) either by one unified
//! operation deadline or by independent legacy per-step timeouts.

pub mod config;
pub mod context;
pub mod observability;
pub mod operation;
pub mod pool;
pub mod resilience;
pub mod timing;

pub use config::ProbeConfig;
pub use context::{
    create_deadline_context, create_deadline_context_with_clock, ApplyBudgetOptions,
    BudgetedRequest, Command, DeadlineContext, PerStepDeadlineContext, SharedDeadlineContext,
    TimeoutOptions, UnifiedDeadlineContext,
};
pub use operation::{OperationError, OperationRunner};
pub use pool::ConnectionPool;
pub use resilience::RetryExecutor;
pub use timing::{CancellableDelay, DeadlineError, DeadlineResult, Remaining};
