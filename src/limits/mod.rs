//! Algorithms for controlling the concurrency limit.

mod latency_band;

use std::{fmt::Debug, time::Duration};

pub use latency_band::LatencyBand;

/// An algorithm for controlling a concurrency limit.
///
/// Owned by a single [Controller](crate::Controller) event loop, which feeds it one [Sample] per
/// completed execution.
pub trait LimitAlgorithm: Debug + Send + 'static {
    /// The current limit.
    fn limit(&self) -> usize;

    /// Update the concurrency limit in response to a new job completion.
    ///
    /// Returns the new limit.
    fn update(&mut self, sample: Sample) -> usize;
}

/// The result of a single execution, including its [Outcome] and latency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub(crate) latency: Duration,
    /// Executions running when the sample was taken, including this one. Slots held by the
    /// starting baseline are not counted.
    pub(crate) in_flight: usize,
    pub(crate) outcome: Outcome,
}

/// Whether an execution succeeded or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The executor returned `Ok`.
    Success,
    /// The executor returned an error, panicked, or was cancelled.
    Failure,
}

impl Sample {
    /// How long the execution took, from admission to completion.
    pub fn latency(&self) -> Duration {
        self.latency
    }
    /// The number of executions running when this one completed, including itself.
    ///
    /// Excludes the `starting_in_flight` baseline.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
    /// Whether the execution succeeded.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }
}
