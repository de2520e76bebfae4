//! Round-trip time sampling.
//!
//! The minimum observed round trip is the floor the unified context
//! subtracts from request budgets.

use std::collections::VecDeque;
use std::time::Duration;

/// Sliding window of recent round-trip samples.
#[derive(Debug, Clone)]
pub struct RoundTripSampler {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl RoundTripSampler {
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Minimum of the window; zero until at least two samples exist.
    pub fn min(&self) -> Duration {
        if self.samples.len() < 2 {
            return Duration::ZERO;
        }
        self.samples.iter().copied().min().unwrap_or_default()
    }
}

impl Default for RoundTripSampler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_needs_two_samples() {
        let mut sampler = RoundTripSampler::new(3);
        sampler.record(Duration::from_millis(20));
        assert_eq!(sampler.min(), Duration::ZERO);

        sampler.record(Duration::from_millis(12));
        assert_eq!(sampler.min(), Duration::from_millis(12));
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut sampler = RoundTripSampler::new(2);
        sampler.record(Duration::from_millis(1));
        sampler.record(Duration::from_millis(30));
        sampler.record(Duration::from_millis(40));
        assert_eq!(sampler.min(), Duration::from_millis(30));
    }
}
