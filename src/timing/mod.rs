//! Timing primitives.
//!
//! # Data Flow
//! ```text
//! clock.rs (monotonic time source, injectable)
//!     → delay.rs (CancellableDelay: one expiration, raced against I/O)
//!     → remaining.rs (Remaining: finite or unbounded time left)
//!     → types.rs (DeadlineError, Phase)
//! ```
//!
//! # Design Decisions
//! - Never reads wall-clock time; everything goes through `MonotonicClock`
//! - Delays are handles, so memoized delays can be shared by identity
//! - Cancellation never signals waiters

pub mod clock;
pub mod delay;
pub mod remaining;
pub mod types;

pub use clock::{ClockRef, ManualClock, MonotonicClock, SystemClock};
pub use delay::{race_optional, CancellableDelay, DelayState};
pub use remaining::Remaining;
pub use types::{DeadlineError, DeadlineResult, Phase};
