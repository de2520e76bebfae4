//! Operation phases bounded by the deadline context.
//!
//! # Data Flow
//! ```text
//! select_server   → race(selection future, ctx.selection_delay)
//! pool.check_out  → race(pool slot, ctx.checkout_delay)
//! execute_command → attach request budget
//!                 → race(write, ctx.socket_write_delay)
//!                 → race(read,  ctx.socket_read_delay)   [+ socket timeout in per-step mode]
//! ```

use serde_json::Value;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::context::{ApplyBudgetOptions, Command, SharedDeadlineContext};
use crate::observability::metrics;
use crate::operation::rtt::RoundTripSampler;
use crate::operation::transport::Transport;
use crate::operation::OperationError;
use crate::pool::ConnectionPool;
use crate::timing::{race_optional, DeadlineError, Phase};

/// Per-command options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// Do not attach a time budget to the command (target ignores it).
    pub omit_time_budget: bool,
}

fn deadline_exceeded(phase: Phase, source: DeadlineError) -> OperationError {
    metrics::record_deadline_exceeded(phase);
    tracing::warn!(phase = %phase, error = %source, "Operation deadline exceeded");
    OperationError::Timeout { phase, source }
}

/// Runs a server selection future under the selection delay.
///
/// In unified mode the delay is left armed: connection checkout reuses it.
pub async fn select_server<F: Future>(
    ctx: &SharedDeadlineContext,
    selection: F,
) -> Result<F::Output, OperationError> {
    let (delay, unified) = {
        let mut guard = ctx.lock();
        (guard.selection_delay(), guard.uses_operation_deadline())
    };

    let outcome = race_optional(delay.as_ref(), selection).await;
    if !unified {
        if let Some(delay) = &delay {
            delay.cancel();
        }
    }
    outcome.map_err(|source| deadline_exceeded(Phase::ServerSelection, source))
}

/// Writes `command` and reads its reply, each step bounded by the context.
pub async fn execute_command<T>(
    ctx: &SharedDeadlineContext,
    transport: &T,
    command: &mut Command,
    options: CommandOptions,
) -> Result<Value, OperationError>
where
    T: Transport,
{
    let (write_delay, socket_timeout) = {
        let guard = ctx.lock();
        guard.apply_budget_to_request(
            command,
            ApplyBudgetOptions {
                skip: options.omit_time_budget,
            },
        );
        (guard.socket_write_delay(), guard.socket_side_timeout())
    };

    let written = race_optional(write_delay.as_ref(), transport.write(command)).await;
    if let Some(delay) = &write_delay {
        delay.cancel();
    }
    written
        .map_err(|source| deadline_exceeded(Phase::SocketWrite, source))?
        .map_err(|source| OperationError::Io {
            phase: Phase::SocketWrite,
            source,
        })?;

    let read_delay = ctx.lock().socket_read_delay();
    let read = async {
        let reply = if socket_timeout.is_zero() {
            Ok(transport.read().await)
        } else {
            tokio::time::timeout(socket_timeout, transport.read())
                .await
                .map_err(|_| OperationError::SocketTimeout(socket_timeout))
        };
        reply.and_then(|reply| {
            reply.map_err(|source| OperationError::Io {
                phase: Phase::SocketRead,
                source,
            })
        })
    };
    let outcome = race_optional(read_delay.as_ref(), read).await;
    if let Some(delay) = &read_delay {
        delay.cancel();
    }
    outcome.map_err(|source| deadline_exceeded(Phase::SocketRead, source))?
}

/// Drives selection, checkout and the command round trip for one server.
#[derive(Debug)]
pub struct OperationRunner<T> {
    pool: ConnectionPool,
    transport: T,
    round_trips: Mutex<RoundTripSampler>,
}

impl<T: Transport> OperationRunner<T> {
    pub fn new(pool: ConnectionPool, transport: T) -> Self {
        Self {
            pool,
            transport,
            round_trips: Mutex::new(RoundTripSampler::default()),
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Current round-trip floor handed to contexts.
    pub fn minimum_round_trip(&self) -> Duration {
        self.round_trips
            .lock()
            .map(|sampler| sampler.min())
            .unwrap_or_default()
    }

    fn record_round_trip(&self, sample: Duration) {
        if let Ok(mut sampler) = self.round_trips.lock() {
            sampler.record(sample);
        }
    }

    /// Runs one operation attempt.
    pub async fn run<S: Future>(
        &self,
        ctx: &SharedDeadlineContext,
        selection: S,
        mut command: Command,
        options: CommandOptions,
    ) -> Result<Value, OperationError> {
        let operation_id = Uuid::new_v4();
        let span = tracing::info_span!("operation", %operation_id, address = %self.pool.address());

        async move {
            select_server(ctx, selection).await?;
            let connection = self.pool.check_out(ctx).await?;
            ctx.lock().set_minimum_round_trip(self.minimum_round_trip());

            let started = Instant::now();
            let reply = execute_command(ctx, &self.transport, &mut command, options).await?;
            self.record_round_trip(started.elapsed());

            tracing::debug!(
                connection_id = connection.id(),
                remaining = %ctx.lock().remaining(),
                "Operation completed"
            );
            Ok(reply)
        }
        .instrument(span)
        .await
    }
}
