//! Remaining-time values.

use std::fmt;
use std::time::Duration;

/// Time left before a deadline.
///
/// `Unbounded` stands for "no deadline at all". A finite value saturates at
/// zero; `Finite(Duration::ZERO)` means the deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Unbounded,
    Finite(Duration),
}

impl Remaining {
    /// Builds a finite value from `budget - elapsed`, saturating at zero.
    pub fn of(budget: Duration, elapsed: Duration) -> Self {
        Remaining::Finite(budget.saturating_sub(elapsed))
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Remaining::Unbounded)
    }

    /// True once a finite deadline has been reached.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Remaining::Finite(d) if d.is_zero())
    }

    /// The finite duration left, `None` when unbounded.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Remaining::Unbounded => None,
            Remaining::Finite(d) => Some(*d),
        }
    }

    /// Whole milliseconds left, `None` when unbounded.
    pub fn as_millis(&self) -> Option<u64> {
        self.as_duration().map(|d| d.as_millis() as u64)
    }

    /// Subtracts `floor` from a finite value, saturating at zero.
    pub fn saturating_sub(self, floor: Duration) -> Self {
        match self {
            Remaining::Unbounded => Remaining::Unbounded,
            Remaining::Finite(d) => Remaining::Finite(d.saturating_sub(floor)),
        }
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Unbounded => write!(f, "unbounded"),
            Remaining::Finite(d) => write!(f, "{}ms", d.as_millis()),
        }
    }
}
