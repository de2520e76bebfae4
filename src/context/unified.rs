//! Unified-deadline strategy.
//!
//! One absolute deadline bounds every step of the operation. Each step's
//! delay is derived from the time left against that single deadline.
//!
//! # Memoization
//! The selection delay is computed once and handed out by identity until
//! `clear()`/`refresh()` or until it is cancelled. The checkout delay reuses
//! whatever the selection delay resolved to, so connection checkout can never
//! outlive server selection's timeout.

use std::time::Duration;

use crate::context::request::{ApplyBudgetOptions, BudgetedRequest};
use crate::observability::metrics;
use crate::timing::{
    CancellableDelay, ClockRef, DeadlineError, DeadlineResult, Phase, Remaining,
};

/// Memo slot that tells "not computed" apart from "computed, no delay needed".
#[derive(Debug, Clone, Default)]
enum Cached {
    #[default]
    Unresolved,
    Resolved(Option<CancellableDelay>),
}

impl Cached {
    /// The memoized value, unless unresolved or holding a cancelled delay.
    fn live(&self) -> Option<Option<CancellableDelay>> {
        match self {
            Cached::Resolved(Some(delay)) if delay.is_cancelled() => None,
            Cached::Resolved(cached) => Some(cached.clone()),
            Cached::Unresolved => None,
        }
    }

    fn cancel(&self) {
        if let Cached::Resolved(Some(delay)) = self {
            delay.cancel();
        }
    }
}

/// Context with a single operation-wide deadline.
#[derive(Debug)]
pub struct UnifiedDeadlineContext {
    /// Zero means unbounded.
    operation_budget: Duration,
    /// Zero means unbounded.
    selection_budget: Duration,
    /// Kept for the configuration record; the operation deadline supersedes it.
    socket_budget: Duration,
    started_at: Duration,
    minimum_round_trip: Duration,
    selection_delay: Cached,
    checkout_delay: Cached,
    clock: ClockRef,
}

impl UnifiedDeadlineContext {
    /// Creates a context whose clock starts now.
    pub fn new(
        operation_budget: Duration,
        selection_budget: Duration,
        socket_budget: Duration,
        clock: ClockRef,
    ) -> Self {
        let started_at = clock.now();
        Self {
            operation_budget,
            selection_budget,
            socket_budget,
            started_at,
            minimum_round_trip: Duration::ZERO,
            selection_delay: Cached::Unresolved,
            checkout_delay: Cached::Unresolved,
            clock,
        }
    }

    pub fn operation_budget(&self) -> Duration {
        self.operation_budget
    }

    pub fn selection_budget(&self) -> Duration {
        self.selection_budget
    }

    pub fn socket_budget(&self) -> Duration {
        self.socket_budget
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started_at)
    }

    /// Time left before the operation deadline.
    pub fn remaining(&self) -> Remaining {
        if self.operation_budget.is_zero() {
            return Remaining::Unbounded;
        }
        Remaining::of(self.operation_budget, self.elapsed())
    }

    pub fn minimum_round_trip(&self) -> Duration {
        self.minimum_round_trip
    }

    /// Records the observed round-trip floor subtracted from request budgets.
    pub fn set_minimum_round_trip(&mut self, floor: Duration) {
        self.minimum_round_trip = floor;
    }

    /// Budget to attach to an outgoing request, if one applies.
    pub fn per_command_budget(&self) -> Option<Duration> {
        self.remaining()
            .saturating_sub(self.minimum_round_trip)
            .as_duration()
            .filter(|budget| !budget.is_zero())
    }

    pub fn budget_is_set(&self) -> bool {
        !self.operation_budget.is_zero()
    }

    pub fn command_timeout_is_applicable(&self) -> bool {
        self.budget_is_set()
    }

    /// Delay bounding server selection.
    pub fn selection_delay(&mut self) -> Option<CancellableDelay> {
        if let Some(cached) = self.selection_delay.live() {
            return cached;
        }

        let remaining = self.remaining();
        if remaining.is_exhausted() {
            return Some(self.expired_delay(format!(
                "Timed out in server selection after {}ms",
                self.operation_budget.as_millis()
            )));
        }

        let selection_binds = !self.selection_budget.is_zero()
            && match remaining {
                Remaining::Unbounded => true,
                Remaining::Finite(left) => left >= self.selection_budget,
            };
        let duration = if selection_binds {
            Some(self.selection_budget)
        } else {
            remaining.as_duration().filter(|left| !left.is_zero())
        };

        let delay = duration.map(|d| self.schedule(Phase::ServerSelection, d));
        tracing::trace!(
            remaining = %remaining,
            selection_binds,
            delay_ms = ?duration.map(|d| d.as_millis()),
            "Resolved server selection delay"
        );
        self.selection_delay = Cached::Resolved(delay.clone());
        delay
    }

    /// Delay bounding connection checkout; mirrors the selection delay.
    ///
    /// Fails with `SelectionNotResolved` until the selection delay has been
    /// resolved since the last `clear()`/`refresh()`.
    pub fn checkout_delay(&mut self) -> DeadlineResult<Option<CancellableDelay>> {
        if let Some(cached) = self.checkout_delay.live() {
            return Ok(cached);
        }
        if matches!(self.selection_delay, Cached::Unresolved) {
            return Err(DeadlineError::SelectionNotResolved);
        }
        let delay = self.selection_delay();
        self.checkout_delay = Cached::Resolved(delay.clone());
        Ok(delay)
    }

    pub fn socket_write_delay(&self) -> Option<CancellableDelay> {
        self.socket_delay(Phase::SocketWrite, "Timed out before socket write")
    }

    pub fn socket_read_delay(&self) -> Option<CancellableDelay> {
        self.socket_delay(Phase::SocketRead, "Timed out before socket read")
    }

    fn socket_delay(&self, phase: Phase, message: &str) -> Option<CancellableDelay> {
        match self.remaining() {
            Remaining::Unbounded => None,
            Remaining::Finite(left) if left.is_zero() => Some(self.expired_delay(message)),
            Remaining::Finite(left) => Some(self.schedule(phase, left)),
        }
    }

    fn schedule(&self, phase: Phase, duration: Duration) -> CancellableDelay {
        metrics::record_delay_created(phase);
        CancellableDelay::expires(duration, self.clock.clone())
    }

    fn expired_delay(&self, message: impl Into<String>) -> CancellableDelay {
        let reason = DeadlineError::exceeded(message, self.operation_budget);
        CancellableDelay::already_expired(reason, self.clock.clone())
    }

    /// Restarts the clock for a new logical attempt.
    pub fn refresh(&mut self) {
        self.started_at = self.clock.now();
        self.minimum_round_trip = Duration::ZERO;
        self.clear();
    }

    /// Cancels and forgets the memoized delays; the deadline is untouched.
    pub fn clear(&mut self) {
        self.selection_delay.cancel();
        self.checkout_delay.cancel();
        self.selection_delay = Cached::Unresolved;
        self.checkout_delay = Cached::Unresolved;
    }

    /// A new context with the same budgets and a fresh full budget.
    pub fn refreshed(&self) -> Self {
        Self::new(
            self.operation_budget,
            self.selection_budget,
            self.socket_budget,
            self.clock.clone(),
        )
    }

    /// Returns the time left, or fails once the deadline has passed.
    pub fn remaining_or_err(&self, message: Option<&str>) -> DeadlineResult<Remaining> {
        let remaining = self.remaining();
        if remaining.is_exhausted() {
            return Err(match message {
                Some(message) => DeadlineError::exceeded(message, self.operation_budget),
                None => DeadlineError::expired_after(self.operation_budget),
            });
        }
        Ok(remaining)
    }

    /// Attaches the per-command budget to `request` when it is positive.
    pub fn apply_budget_to_request<R>(&self, request: &mut R, options: ApplyBudgetOptions)
    where
        R: BudgetedRequest + ?Sized,
    {
        if options.skip {
            return;
        }
        if let Some(budget) = self.per_command_budget() {
            request.set_time_budget(budget);
        }
    }

    /// Socket-level timeout for the transport: always zero here.
    pub fn socket_side_timeout(&self) -> Duration {
        Duration::ZERO
    }
}

/// Clones share the absolute deadline (same start) but none of the memoized
/// delays or the round-trip floor.
impl Clone for UnifiedDeadlineContext {
    fn clone(&self) -> Self {
        let mut clone = self.refreshed();
        clone.started_at = self.started_at;
        clone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::request::Command;
    use crate::timing::ManualClock;
    use std::sync::Arc;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn context(op: u64, selection: u64) -> (UnifiedDeadlineContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let ctx = UnifiedDeadlineContext::new(ms(op), ms(selection), Duration::ZERO, clock.clone());
        (ctx, clock)
    }

    #[test]
    fn test_remaining_tracks_elapsed() {
        let (ctx, clock) = context(1000, 2000);
        assert_eq!(ctx.remaining(), Remaining::Finite(ms(1000)));

        clock.advance_ms(250);
        assert_eq!(ctx.remaining(), Remaining::Finite(ms(750)));

        clock.advance_ms(5000);
        assert!(ctx.remaining().is_exhausted());
    }

    #[test]
    fn test_selection_budget_binds_when_smaller() {
        let (mut ctx, _clock) = context(10_000, 2000);
        let delay = ctx.selection_delay().unwrap();
        assert_eq!(delay.duration(), ms(2000));
    }

    #[test]
    fn test_selection_delay_is_memoized_until_cancelled() {
        let (mut ctx, _clock) = context(1000, 0);
        let first = ctx.selection_delay().unwrap();
        let second = ctx.selection_delay().unwrap();
        assert!(first.ptr_eq(&second));

        first.cancel();
        let third = ctx.selection_delay().unwrap();
        assert!(!third.ptr_eq(&first));
    }

    #[test]
    fn test_unbounded_context_without_selection_budget_has_no_delay() {
        let (mut ctx, _clock) = context(0, 0);
        assert!(ctx.selection_delay().is_none());
        assert!(ctx.socket_write_delay().is_none());
        assert!(ctx.socket_read_delay().is_none());
        // The memoized "no delay" still counts as resolved.
        assert!(matches!(ctx.checkout_delay(), Ok(None)));
    }

    #[test]
    fn test_exhausted_selection_is_not_cached() {
        let (mut ctx, clock) = context(100, 0);
        clock.advance_ms(150);

        let delay = ctx.selection_delay().unwrap();
        assert!(delay.is_expired());
        assert_eq!(
            delay.throw_if_expired().unwrap_err().to_string(),
            "Timed out in server selection after 100ms"
        );
        assert!(matches!(ctx.checkout_delay(), Err(DeadlineError::SelectionNotResolved)));
    }

    #[test]
    fn test_checkout_mirrors_selection() {
        let (mut ctx, _clock) = context(1000, 0);
        assert!(matches!(ctx.checkout_delay(), Err(DeadlineError::SelectionNotResolved)));

        let selection = ctx.selection_delay().unwrap();
        let checkout = ctx.checkout_delay().unwrap().unwrap();
        assert!(checkout.ptr_eq(&selection));
    }

    #[test]
    fn test_checkout_rederives_after_cancel() {
        let (mut ctx, clock) = context(1000, 0);
        ctx.selection_delay();
        let first = ctx.checkout_delay().unwrap().unwrap();
        first.cancel();
        clock.advance_ms(100);

        let second = ctx.checkout_delay().unwrap().unwrap();
        assert!(!second.ptr_eq(&first));
        assert_eq!(second.duration(), ms(900));
        assert!(ctx.selection_delay().unwrap().ptr_eq(&second));
    }

    #[test]
    fn test_socket_delays_are_fresh() {
        let (ctx, clock) = context(1000, 0);
        clock.advance_ms(400);

        let write = ctx.socket_write_delay().unwrap();
        let read = ctx.socket_read_delay().unwrap();
        assert_eq!(write.duration(), ms(600));
        assert!(!write.ptr_eq(&read));

        clock.advance_ms(600);
        let late = ctx.socket_read_delay().unwrap();
        assert_eq!(
            late.throw_if_expired().unwrap_err().to_string(),
            "Timed out before socket read"
        );
    }

    #[test]
    fn test_per_command_budget_subtracts_round_trip() {
        let (mut ctx, clock) = context(1000, 0);
        clock.advance_ms(100);
        ctx.set_minimum_round_trip(ms(50));
        assert_eq!(ctx.per_command_budget(), Some(ms(850)));

        ctx.set_minimum_round_trip(ms(900));
        assert_eq!(ctx.per_command_budget(), None);
    }

    #[test]
    fn test_apply_budget_respects_skip_and_sign() {
        let (mut ctx, clock) = context(1000, 0);

        let mut skipped = Command::new("ping");
        ctx.apply_budget_to_request(&mut skipped, ApplyBudgetOptions::skip());
        assert_eq!(skipped.max_time_ms(), None);

        let mut sent = Command::new("ping");
        ctx.apply_budget_to_request(&mut sent, ApplyBudgetOptions::default());
        assert_eq!(sent.max_time_ms(), Some(1000));

        clock.advance_ms(990);
        ctx.set_minimum_round_trip(ms(20));
        let mut late = Command::new("ping");
        ctx.apply_budget_to_request(&mut late, ApplyBudgetOptions::default());
        assert_eq!(late.max_time_ms(), None);
    }

    #[test]
    fn test_refresh_resets_clock_and_floor() {
        let (mut ctx, clock) = context(1000, 0);
        ctx.set_minimum_round_trip(ms(30));
        let before = ctx.selection_delay().unwrap();
        clock.advance_ms(500);

        ctx.refresh();

        assert!(before.is_cancelled());
        assert_eq!(ctx.remaining(), Remaining::Finite(ms(1000)));
        assert_eq!(ctx.minimum_round_trip(), Duration::ZERO);
        assert!(matches!(ctx.checkout_delay(), Err(DeadlineError::SelectionNotResolved)));
    }

    #[test]
    fn test_clear_keeps_deadline() {
        let (mut ctx, clock) = context(1000, 0);
        ctx.selection_delay();
        clock.advance_ms(300);

        ctx.clear();

        assert_eq!(ctx.remaining(), Remaining::Finite(ms(700)));
        assert_eq!(ctx.selection_delay().unwrap().duration(), ms(700));
    }

    #[test]
    fn test_clone_shares_start_but_not_caches() {
        let (mut ctx, clock) = context(1000, 0);
        ctx.set_minimum_round_trip(ms(10));
        let original = ctx.selection_delay().unwrap();
        clock.advance_ms(200);

        let mut sibling = ctx.clone();
        sibling.clear();

        assert_eq!(sibling.remaining(), Remaining::Finite(ms(800)));
        assert_eq!(sibling.minimum_round_trip(), Duration::ZERO);
        assert!(ctx.selection_delay().unwrap().ptr_eq(&original));
        assert!(original.is_pending());

        let fresh = ctx.refreshed();
        assert_eq!(fresh.remaining(), Remaining::Finite(ms(1000)));
    }

    #[test]
    fn test_remaining_or_err_messages() {
        let (ctx, clock) = context(50, 0);
        assert_eq!(ctx.remaining_or_err(None), Ok(Remaining::Finite(ms(50))));

        clock.advance_ms(60);
        let err = ctx.remaining_or_err(None).unwrap_err();
        assert_eq!(err.to_string(), "Expired after 50ms");
        assert_eq!(err.duration(), Some(ms(50)));

        let err = ctx.remaining_or_err(Some("Timed out during retry")).unwrap_err();
        assert_eq!(err.to_string(), "Timed out during retry");
    }

    #[test]
    fn test_budget_flags() {
        let (bounded, _) = context(10, 0);
        let (unbounded, _) = context(0, 100);
        assert!(bounded.budget_is_set());
        assert!(bounded.command_timeout_is_applicable());
        assert!(!unbounded.budget_is_set());
        assert_eq!(unbounded.socket_side_timeout(), Duration::ZERO);
    }
}
