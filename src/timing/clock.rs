//! Monotonic clock sources.
//!
//! Every deadline computation reads time through [`MonotonicClock`], so the
//! contexts never touch wall-clock time and tests can drive time by hand.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A time source that never runs backward.
///
/// `now()` is the time elapsed since an arbitrary fixed epoch chosen by the
/// implementation. Only differences between two readings are meaningful.
pub trait MonotonicClock: Send + Sync + fmt::Debug {
    fn now(&self) -> Duration;
}

/// Shared handle to a clock, as held by delays and contexts.
pub type ClockRef = Arc<dyn MonotonicClock>;

/// Production clock backed by `tokio::time::Instant`.
///
/// Follows Tokio's clock, so paused-time tests (`start_paused = true`) see it
/// advance together with `tokio::time::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Convenience constructor for the common `Arc<dyn MonotonicClock>` form.
    pub fn shared() -> ClockRef {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now(&self) -> Duration {
        Instant::now().saturating_duration_since(self.epoch)
    }
}

/// Clock that only moves when told to.
///
/// Used by tests that inspect remaining budgets synchronously.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the clock at `start` past the epoch.
    pub fn starting_at(start: Duration) -> Self {
        Self {
            nanos: AtomicU64::new(start.as_nanos() as u64),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::AcqRel);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl MonotonicClock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}
