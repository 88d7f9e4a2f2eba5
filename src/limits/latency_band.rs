use std::time::Duration;

use crate::options::Options;

use super::{LimitAlgorithm, Outcome, Sample};

/// Additive-increase/additive-decrease over a band of latencies.
///
/// Each completed execution moves the limit by at most one, based on that one sample alone:
///
/// - faster than `fast_threshold`: increase by one, with no upper bound
/// - slower than `fast_threshold + slow_margin`: decrease by one, never below `min_limit`
/// - anywhere in between (inclusive): no change
///
/// Failed executions are treated as slow.
#[derive(Debug, Clone)]
pub struct LatencyBand {
    limit: usize,
    min_limit: usize,
    fast_threshold: Duration,
    slow_threshold: Duration,
}

impl LatencyBand {
    #[allow(missing_docs)]
    pub fn new(
        initial_limit: usize,
        min_limit: usize,
        fast_threshold: Duration,
        slow_margin: Duration,
    ) -> Self {
        Self {
            limit: initial_limit.max(min_limit),
            min_limit,
            fast_threshold,
            slow_threshold: fast_threshold.saturating_add(slow_margin),
        }
    }

    fn back_off(&mut self) {
        self.limit = if self.limit > self.min_limit {
            self.limit - 1
        } else {
            self.min_limit
        };
    }
}

impl From<&Options> for LatencyBand {
    fn from(options: &Options) -> Self {
        Self::new(
            options.limit(),
            options.min_limit(),
            options.fast_threshold(),
            options.slow_margin(),
        )
    }
}

impl LimitAlgorithm for LatencyBand {
    fn limit(&self) -> usize {
        self.limit
    }

    fn update(&mut self, sample: Sample) -> usize {
        match sample.outcome {
            Outcome::Failure => self.back_off(),
            Outcome::Success if sample.latency < self.fast_threshold => {
                self.limit = self.limit.saturating_add(1);
            }
            Outcome::Success if sample.latency > self.slow_threshold => self.back_off(),
            Outcome::Success => {}
        }

        self.limit
    }
}
