//! Cancellable delays.
//!
//! A [`CancellableDelay`] is one scheduled expiration. It is a cheap handle
//! over shared state: clones observe and drive the same delay, which is how a
//! memoized delay is handed to several readers.
//!
//! # States
//! ```text
//! Pending → Expired    (duration elapsed, or built already expired)
//! Pending → Cancelled  (cancel() before expiry)
//! ```
//! Both `Expired` and `Cancelled` are terminal.
//!
//! Expiry is realised lazily: the state is settled against the clock whenever
//! it is read, and a Tokio timer only exists while a caller awaits
//! [`CancellableDelay::expired`].

use std::future::{pending, Future};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

use crate::timing::clock::ClockRef;
use crate::timing::remaining::Remaining;
use crate::timing::types::{DeadlineError, DeadlineResult};

/// Lifecycle state of a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayState {
    Pending,
    Expired,
    Cancelled,
}

/// Handle to one scheduled expiration.
#[derive(Debug, Clone)]
pub struct CancellableDelay {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Zero never expires on its own.
    duration: Duration,
    started_at: Duration,
    clock: ClockRef,
    state: Mutex<DelayState>,
    /// Pre-supplied reason for delays built already expired.
    rejection: Option<DeadlineError>,
    cancelled: Notify,
}

impl CancellableDelay {
    /// Schedules a delay that expires `duration` from now.
    pub fn expires(duration: Duration, clock: ClockRef) -> Self {
        let started_at = clock.now();
        Self::build(duration, started_at, clock, DelayState::Pending, None)
    }

    /// A delay that is expired from birth and carries `reason`.
    ///
    /// Used when a budget is already exhausted, so no timer is ever armed.
    pub fn already_expired(reason: DeadlineError, clock: ClockRef) -> Self {
        let started_at = clock.now();
        let duration = reason.duration().unwrap_or_default();
        Self::build(duration, started_at, clock, DelayState::Expired, Some(reason))
    }

    fn build(
        duration: Duration,
        started_at: Duration,
        clock: ClockRef,
        state: DelayState,
        rejection: Option<DeadlineError>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                duration,
                started_at,
                clock,
                state: Mutex::new(state),
                rejection,
                cancelled: Notify::new(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DelayState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves a pending delay to `Expired` once its deadline has passed.
    fn settle(&self, state: &mut DelayState) {
        if *state == DelayState::Pending && self.is_due() {
            *state = DelayState::Expired;
        }
    }

    fn is_due(&self) -> bool {
        let inner = &self.inner;
        !inner.duration.is_zero() && inner.clock.now() >= inner.started_at + inner.duration
    }

    /// Configured duration; zero for a delay that never expires.
    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn state(&self) -> DelayState {
        let mut state = self.lock_state();
        self.settle(&mut state);
        *state
    }

    pub fn is_pending(&self) -> bool {
        self.state() == DelayState::Pending
    }

    pub fn is_expired(&self) -> bool {
        self.state() == DelayState::Expired
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == DelayState::Cancelled
    }

    /// Stops the delay without signalling anyone.
    ///
    /// Idempotent, and a no-op on a delay that has already expired.
    pub fn cancel(&self) {
        let mut state = self.lock_state();
        self.settle(&mut state);
        if *state == DelayState::Pending {
            *state = DelayState::Cancelled;
            drop(state);
            self.inner.cancelled.notify_waiters();
        }
    }

    /// Time left before the delay fires.
    pub fn remaining(&self) -> Remaining {
        if self.is_expired() {
            return Remaining::Finite(Duration::ZERO);
        }
        if self.inner.duration.is_zero() {
            return Remaining::Unbounded;
        }
        let deadline = self.inner.started_at + self.inner.duration;
        Remaining::Finite(deadline.saturating_sub(self.inner.clock.now()))
    }

    /// Time since the delay was created.
    pub fn elapsed(&self) -> Duration {
        self.inner.clock.now().saturating_sub(self.inner.started_at)
    }

    /// The error this delay reports when it has expired.
    pub fn error(&self) -> DeadlineError {
        self.inner
            .rejection
            .clone()
            .unwrap_or_else(|| DeadlineError::expired_after(self.inner.duration))
    }

    /// Fails immediately if the delay has already expired.
    pub fn throw_if_expired(&self) -> DeadlineResult<()> {
        if self.is_expired() {
            return Err(self.error());
        }
        Ok(())
    }

    /// Resolves with the deadline error once the delay fires.
    ///
    /// Never resolves for a cancelled delay or one with a zero duration, so it
    /// can sit in a `select!` next to the I/O it bounds.
    pub async fn expired(&self) -> DeadlineError {
        loop {
            let cancelled = self.inner.cancelled.notified();
            match self.state() {
                DelayState::Expired => return self.error(),
                DelayState::Cancelled => return pending::<DeadlineError>().await,
                DelayState::Pending => {}
            }

            match self.remaining() {
                Remaining::Unbounded => cancelled.await,
                Remaining::Finite(left) => {
                    tokio::select! {
                        _ = tokio::time::sleep(left) => {}
                        _ = cancelled => {}
                    }
                }
            }
        }
    }

    /// Runs `future` unless the delay fires first.
    pub async fn race<F: Future>(&self, future: F) -> DeadlineResult<F::Output> {
        self.throw_if_expired()?;
        tokio::select! {
            biased;
            output = future => Ok(output),
            err = self.expired() => Err(err),
        }
    }

    /// True when both handles refer to the same delay.
    pub fn ptr_eq(&self, other: &CancellableDelay) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Races `future` against `delay` when there is one.
pub async fn race_optional<F: Future>(
    delay: Option<&CancellableDelay>,
    future: F,
) -> DeadlineResult<F::Output> {
    match delay {
        Some(delay) => delay.race(future).await,
        None => Ok(future.await),
    }
}
