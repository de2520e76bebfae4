//! Context construction.
//!
//! The strategy is picked by the shape of [`TimeoutOptions`]:
//!
//! ```text
//! session_context set                      → reuse that shared context
//! timeout + server_selection_timeout       → UnifiedDeadlineContext
//! server_selection_timeout + wait_queue    → PerStepDeadlineContext
//! anything else                            → UnrecognizedOptionsShape
//! ```

use std::time::Duration;

use crate::config::schema::TimeoutConfig;
use crate::context::{
    DeadlineContext, PerStepDeadlineContext, SharedDeadlineContext, UnifiedDeadlineContext,
};
use crate::timing::{ClockRef, DeadlineError, DeadlineResult, SystemClock};

/// Timeout options an operation is started with.
#[derive(Debug, Clone, Default)]
pub struct TimeoutOptions {
    /// Operation-wide budget (zero = unbounded).
    pub timeout: Option<Duration>,
    pub server_selection_timeout: Option<Duration>,
    pub wait_queue_timeout: Option<Duration>,
    pub socket_timeout: Option<Duration>,
    /// Context already associated with the session; reused as is.
    pub session_context: Option<SharedDeadlineContext>,
}

impl TimeoutOptions {
    /// Options for the unified-deadline strategy.
    pub fn unified(timeout: Duration, server_selection_timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            server_selection_timeout: Some(server_selection_timeout),
            ..Self::default()
        }
    }

    /// Options for the per-step strategy.
    pub fn per_step(
        server_selection_timeout: Duration,
        wait_queue_timeout: Duration,
        socket_timeout: Duration,
    ) -> Self {
        Self {
            server_selection_timeout: Some(server_selection_timeout),
            wait_queue_timeout: Some(wait_queue_timeout),
            socket_timeout: Some(socket_timeout),
            ..Self::default()
        }
    }

    pub fn with_socket_timeout(mut self, socket_timeout: Duration) -> Self {
        self.socket_timeout = Some(socket_timeout);
        self
    }

    pub fn with_session_context(mut self, ctx: SharedDeadlineContext) -> Self {
        self.session_context = Some(ctx);
        self
    }
}

impl TryFrom<&TimeoutConfig> for TimeoutOptions {
    type Error = DeadlineError;

    fn try_from(config: &TimeoutConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            timeout: millis("timeout_ms", config.timeout_ms)?,
            server_selection_timeout: millis(
                "server_selection_timeout_ms",
                config.server_selection_timeout_ms,
            )?,
            wait_queue_timeout: millis("wait_queue_timeout_ms", config.wait_queue_timeout_ms)?,
            socket_timeout: millis("socket_timeout_ms", config.socket_timeout_ms)?,
            session_context: None,
        })
    }
}

fn millis(field: &str, value: Option<i64>) -> DeadlineResult<Option<Duration>> {
    match value {
        None => Ok(None),
        Some(ms) if ms < 0 => Err(DeadlineError::InvalidConfiguration(format!(
            "{} must be non-negative, got {}",
            field, ms
        ))),
        Some(ms) => Ok(Some(Duration::from_millis(ms as u64))),
    }
}

impl DeadlineContext {
    /// Builds a new context from the option shape, ignoring any session context.
    pub fn from_options(options: &TimeoutOptions, clock: ClockRef) -> DeadlineResult<Self> {
        let socket_timeout = options.socket_timeout.unwrap_or_default();
        match (
            options.timeout,
            options.server_selection_timeout,
            options.wait_queue_timeout,
        ) {
            (Some(timeout), Some(selection), _) => {
                tracing::debug!(
                    timeout_ms = timeout.as_millis() as u64,
                    server_selection_timeout_ms = selection.as_millis() as u64,
                    "Creating unified deadline context"
                );
                Ok(UnifiedDeadlineContext::new(timeout, selection, socket_timeout, clock).into())
            }
            (_, Some(selection), Some(wait_queue)) => {
                tracing::debug!(
                    server_selection_timeout_ms = selection.as_millis() as u64,
                    wait_queue_timeout_ms = wait_queue.as_millis() as u64,
                    socket_timeout_ms = socket_timeout.as_millis() as u64,
                    "Creating per-step deadline context"
                );
                Ok(PerStepDeadlineContext::new(selection, wait_queue, socket_timeout, clock).into())
            }
            _ => Err(DeadlineError::UnrecognizedOptionsShape(
                "expected timeout + server_selection_timeout, or \
                 server_selection_timeout + wait_queue_timeout"
                    .to_string(),
            )),
        }
    }
}

/// Returns the session's context if there is one, otherwise a new one.
pub fn create_deadline_context(options: &TimeoutOptions) -> DeadlineResult<SharedDeadlineContext> {
    create_deadline_context_with_clock(options, SystemClock::shared())
}

/// [`create_deadline_context`] with an explicit clock.
pub fn create_deadline_context_with_clock(
    options: &TimeoutOptions,
    clock: ClockRef,
) -> DeadlineResult<SharedDeadlineContext> {
    if let Some(existing) = &options.session_context {
        return Ok(existing.clone());
    }
    DeadlineContext::from_options(options, clock).map(SharedDeadlineContext::new)
}
