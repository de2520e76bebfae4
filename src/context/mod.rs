//! Operation deadline contexts.
//!
//! # Data Flow
//! ```text
//! TimeoutOptions
//!     → factory.rs (pick strategy by option shape, or reuse a session context)
//!     → DeadlineContext::{Unified, PerStep}
//!     → consumers ask for per-step delays:
//!         selection_delay → checkout_delay → socket_write_delay → socket_read_delay
//!     → request budget attached via apply_budget_to_request
//! ```
//!
//! # Design Decisions
//! - Strategy is chosen once, at the factory
//! - The context only reports; it never retries and never logs errors
//! - Sibling tasks share a context through `SharedDeadlineContext`; the lock is
//!   only held to read a delay, never across an await

pub mod factory;
pub mod per_step;
pub mod request;
pub mod unified;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::timing::{CancellableDelay, DeadlineResult, Remaining};

pub use factory::{create_deadline_context, create_deadline_context_with_clock, TimeoutOptions};
pub use per_step::PerStepDeadlineContext;
pub use request::{ApplyBudgetOptions, BudgetedRequest, Command};
pub use unified::UnifiedDeadlineContext;

/// The deadline context of one operation attempt.
///
/// `Clone` yields a sibling that shares the absolute deadline but none of the
/// memoized delays; use [`DeadlineContext::refreshed`] for a fresh budget.
#[derive(Debug, Clone)]
pub enum DeadlineContext {
    Unified(UnifiedDeadlineContext),
    PerStep(PerStepDeadlineContext),
}

impl DeadlineContext {
    /// True for the unified (operation-wide deadline) strategy.
    pub fn uses_operation_deadline(&self) -> bool {
        matches!(self, DeadlineContext::Unified(_))
    }

    pub fn remaining(&self) -> Remaining {
        match self {
            DeadlineContext::Unified(ctx) => ctx.remaining(),
            DeadlineContext::PerStep(ctx) => ctx.remaining(),
        }
    }

    pub fn selection_delay(&mut self) -> Option<CancellableDelay> {
        match self {
            DeadlineContext::Unified(ctx) => ctx.selection_delay(),
            DeadlineContext::PerStep(ctx) => ctx.selection_delay(),
        }
    }

    pub fn checkout_delay(&mut self) -> DeadlineResult<Option<CancellableDelay>> {
        match self {
            DeadlineContext::Unified(ctx) => ctx.checkout_delay(),
            DeadlineContext::PerStep(ctx) => Ok(ctx.checkout_delay()),
        }
    }

    pub fn socket_write_delay(&self) -> Option<CancellableDelay> {
        match self {
            DeadlineContext::Unified(ctx) => ctx.socket_write_delay(),
            DeadlineContext::PerStep(ctx) => ctx.socket_write_delay(),
        }
    }

    pub fn socket_read_delay(&self) -> Option<CancellableDelay> {
        match self {
            DeadlineContext::Unified(ctx) => ctx.socket_read_delay(),
            DeadlineContext::PerStep(ctx) => ctx.socket_read_delay(),
        }
    }

    pub fn per_command_budget(&self) -> Option<Duration> {
        match self {
            DeadlineContext::Unified(ctx) => ctx.per_command_budget(),
            DeadlineContext::PerStep(ctx) => ctx.per_command_budget(),
        }
    }

    pub fn socket_side_timeout(&self) -> Duration {
        match self {
            DeadlineContext::Unified(ctx) => ctx.socket_side_timeout(),
            DeadlineContext::PerStep(ctx) => ctx.socket_side_timeout(),
        }
    }

    pub fn budget_is_set(&self) -> bool {
        match self {
            DeadlineContext::Unified(ctx) => ctx.budget_is_set(),
            DeadlineContext::PerStep(_) => false,
        }
    }

    pub fn command_timeout_is_applicable(&self) -> bool {
        self.budget_is_set()
    }

    /// Time left, or `DeadlineExceeded` once the operation deadline passed.
    pub fn remaining_or_err(&self, message: Option<&str>) -> DeadlineResult<Remaining> {
        match self {
            DeadlineContext::Unified(ctx) => ctx.remaining_or_err(message),
            DeadlineContext::PerStep(ctx) => Ok(ctx.remaining()),
        }
    }

    pub fn apply_budget_to_request<R>(&self, request: &mut R, options: ApplyBudgetOptions)
    where
        R: BudgetedRequest + ?Sized,
    {
        if let DeadlineContext::Unified(ctx) = self {
            ctx.apply_budget_to_request(request, options);
        }
    }

    /// Ignored by the per-step strategy, which attaches no request budget.
    pub fn set_minimum_round_trip(&mut self, floor: Duration) {
        if let DeadlineContext::Unified(ctx) = self {
            ctx.set_minimum_round_trip(floor);
        }
    }

    pub fn refresh(&mut self) {
        match self {
            DeadlineContext::Unified(ctx) => ctx.refresh(),
            DeadlineContext::PerStep(ctx) => ctx.refresh(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            DeadlineContext::Unified(ctx) => ctx.clear(),
            DeadlineContext::PerStep(ctx) => ctx.clear(),
        }
    }

    /// A new context with the same configuration and a fresh budget.
    pub fn refreshed(&self) -> Self {
        match self {
            DeadlineContext::Unified(ctx) => DeadlineContext::Unified(ctx.refreshed()),
            DeadlineContext::PerStep(ctx) => DeadlineContext::PerStep(ctx.refreshed()),
        }
    }
}

impl From<UnifiedDeadlineContext> for DeadlineContext {
    fn from(ctx: UnifiedDeadlineContext) -> Self {
        DeadlineContext::Unified(ctx)
    }
}

impl From<PerStepDeadlineContext> for DeadlineContext {
    fn from(ctx: PerStepDeadlineContext) -> Self {
        DeadlineContext::PerStep(ctx)
    }
}

/// A context handle shared by every step (and sibling task) of an operation.
///
/// Cloning the handle shares the same context. Use
/// [`SharedDeadlineContext::clone_context`] or
/// [`SharedDeadlineContext::refreshed`] to derive an independent one.
#[derive(Debug, Clone)]
pub struct SharedDeadlineContext {
    inner: Arc<Mutex<DeadlineContext>>,
}

impl SharedDeadlineContext {
    pub fn new(ctx: DeadlineContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ctx)),
        }
    }

    /// Locks the context. Do not hold the guard across an await.
    pub fn lock(&self) -> MutexGuard<'_, DeadlineContext> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Independent context sharing this one's absolute deadline.
    pub fn clone_context(&self) -> Self {
        Self::new(self.lock().clone())
    }

    /// Independent context with a fresh full budget.
    pub fn refreshed(&self) -> Self {
        Self::new(self.lock().refreshed())
    }

    /// True when both handles point at the same context.
    pub fn ptr_eq(&self, other: &SharedDeadlineContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<DeadlineContext> for SharedDeadlineContext {
    fn from(ctx: DeadlineContext) -> Self {
        Self::new(ctx)
    }
}
