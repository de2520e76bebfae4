//! Per-step (legacy) strategy.
//!
//! No shared deadline: server selection, connection checkout and the socket
//! each have an independently configured timeout. Nothing derives from
//! anything else, so refreshing is meaningless.

use std::time::Duration;

use crate::observability::metrics;
use crate::timing::{CancellableDelay, ClockRef, Phase, Remaining};

/// Context with independent timeouts per step. Zero means unbounded.
#[derive(Debug, Clone)]
pub struct PerStepDeadlineContext {
    selection_timeout: Duration,
    checkout_timeout: Duration,
    socket_timeout: Duration,
    clock: ClockRef,
}

impl PerStepDeadlineContext {
    pub fn new(
        selection_timeout: Duration,
        checkout_timeout: Duration,
        socket_timeout: Duration,
        clock: ClockRef,
    ) -> Self {
        Self {
            selection_timeout,
            checkout_timeout,
            socket_timeout,
            clock,
        }
    }

    pub fn selection_timeout(&self) -> Duration {
        self.selection_timeout
    }

    pub fn checkout_timeout(&self) -> Duration {
        self.checkout_timeout
    }

    /// There is no operation deadline in this mode.
    pub fn remaining(&self) -> Remaining {
        Remaining::Unbounded
    }

    /// A fresh delay per call; never memoized.
    pub fn selection_delay(&self) -> Option<CancellableDelay> {
        self.fresh(Phase::ServerSelection, self.selection_timeout)
    }

    pub fn checkout_delay(&self) -> Option<CancellableDelay> {
        self.fresh(Phase::ConnectionCheckout, self.checkout_timeout)
    }

    fn fresh(&self, phase: Phase, timeout: Duration) -> Option<CancellableDelay> {
        if timeout.is_zero() {
            return None;
        }
        metrics::record_delay_created(phase);
        Some(CancellableDelay::expires(timeout, self.clock.clone()))
    }

    /// Socket operations are bounded by the transport, not by this context.
    pub fn socket_write_delay(&self) -> Option<CancellableDelay> {
        None
    }

    pub fn socket_read_delay(&self) -> Option<CancellableDelay> {
        None
    }

    pub fn per_command_budget(&self) -> Option<Duration> {
        None
    }

    /// Socket timeout the transport applies on its own.
    pub fn socket_side_timeout(&self) -> Duration {
        self.socket_timeout
    }

    pub fn refresh(&mut self) {}

    pub fn clear(&mut self) {}

    pub fn refreshed(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::ManualClock;
    use std::sync::Arc;

    fn context(selection: u64, checkout: u64, socket: u64) -> PerStepDeadlineContext {
        PerStepDeadlineContext::new(
            Duration::from_millis(selection),
            Duration::from_millis(checkout),
            Duration::from_millis(socket),
            Arc::new(ManualClock::new()),
        )
    }

    #[test]
    fn test_delays_are_independent_and_fresh() {
        let ctx = context(500, 30_000, 0);

        let first = ctx.selection_delay().unwrap();
        let second = ctx.selection_delay().unwrap();
        assert_eq!(first.duration(), Duration::from_millis(500));
        assert!(!first.ptr_eq(&second));

        assert_eq!(ctx.checkout_delay().unwrap().duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_timeouts_mean_no_delay() {
        let ctx = context(0, 0, 0);
        assert!(ctx.selection_delay().is_none());
        assert!(ctx.checkout_delay().is_none());
    }

    #[test]
    fn test_socket_concerns_left_to_transport() {
        let mut ctx = context(1, 1, 45_000);
        ctx.refresh();
        ctx.clear();

        assert!(ctx.socket_write_delay().is_none());
        assert!(ctx.socket_read_delay().is_none());
        assert_eq!(ctx.per_command_budget(), None);
        assert_eq!(ctx.socket_side_timeout(), Duration::from_secs(45));
        assert_eq!(ctx.remaining(), Remaining::Unbounded);
        assert_eq!(ctx.refreshed().socket_side_timeout(), Duration::from_secs(45));
    }
}
