//! Shared utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use op_deadline::config::{PoolConfig, RetryConfig, RetryDeadline};
use op_deadline::context::{create_deadline_context_with_clock, SharedDeadlineContext, TimeoutOptions};
use op_deadline::operation::{OperationRunner, SimulatedTransport};
use op_deadline::pool::ConnectionPool;
use op_deadline::timing::ManualClock;

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// A manual clock and a unified context driven by it.
#[allow(dead_code)]
pub fn unified_with_manual_clock(
    operation_ms: u64,
    selection_ms: u64,
) -> (SharedDeadlineContext, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let ctx = create_deadline_context_with_clock(
        &TimeoutOptions::unified(ms(operation_ms), ms(selection_ms)),
        clock.clone(),
    )
    .unwrap();
    (ctx, clock)
}

/// A manual clock and a per-step context driven by it.
#[allow(dead_code)]
pub fn per_step_with_manual_clock(
    selection_ms: u64,
    wait_queue_ms: u64,
    socket_ms: u64,
) -> (SharedDeadlineContext, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let ctx = create_deadline_context_with_clock(
        &TimeoutOptions::per_step(ms(selection_ms), ms(wait_queue_ms), ms(socket_ms)),
        clock.clone(),
    )
    .unwrap();
    (ctx, clock)
}

/// Runner against a single-connection pool and a simulated server.
#[allow(dead_code)]
pub fn simulated_runner(write_ms: u64, read_ms: u64, fail_first: u32) -> OperationRunner<SimulatedTransport> {
    OperationRunner::new(
        ConnectionPool::new(&PoolConfig {
            address: "replica-0.internal:27017".into(),
            max_connections: 1,
        }),
        SimulatedTransport::new(ms(write_ms), ms(read_ms)).failing_first(fail_first),
    )
}

#[allow(dead_code)]
pub fn retry_config(deadline: RetryDeadline) -> RetryConfig {
    RetryConfig {
        enabled: true,
        max_attempts: 3,
        base_delay_ms: 100,
        max_delay_ms: 2000,
        deadline,
    }
}
