//! Controller configuration.

use std::time::Duration;

use bon::Builder;

/// Configuration for a [Controller](crate::Controller).
///
/// Every field is optional:
///
/// | Field | Default |
/// |---|---|
/// | `limit` | 1000 |
/// | `min_limit` | 1 |
/// | `starting_in_flight` | 0 |
/// | `fast_threshold` | 500ms |
/// | `slow_margin` | 500ms |
///
/// `starting_in_flight` defaults to 0 rather than 1 on purpose: a baseline of 1 with
/// `min_limit = 1` leaves no slot free once the limit has backed off to its floor.
///
/// ```
/// use std::time::Duration;
/// use latency_gate::Options;
///
/// let options = Options::builder()
///     .limit(8)
///     .fast_threshold(Duration::from_millis(100))
///     .build();
///
/// assert_eq!(options.min_limit(), 1);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct Options {
    /// Initial concurrency limit.
    #[builder(default = 1000)]
    limit: usize,

    /// The limit never backs off below this.
    #[builder(default = 1)]
    min_limit: usize,

    /// Slots considered occupied before anything has been admitted.
    #[builder(default = 0)]
    starting_in_flight: usize,

    /// Executions faster than this increase the limit.
    #[builder(default = Duration::from_millis(500))]
    fast_threshold: Duration,

    /// Executions slower than `fast_threshold + slow_margin` decrease the limit.
    #[builder(default = Duration::from_millis(500))]
    slow_margin: Duration,
}

/// Invalid [Options].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("min_limit ({min_limit}) must not be greater than limit ({limit})")]
    #[allow(missing_docs)]
    MinLimitAboveLimit { min_limit: usize, limit: usize },
    #[error("min_limit must be at least 1")]
    #[allow(missing_docs)]
    ZeroMinLimit,
    /// A limit resting at `min_limit` would have no slot left to admit into. This is also why
    /// `starting_in_flight` defaults to 0 and not 1.
    #[error("starting_in_flight ({starting_in_flight}) must be less than min_limit ({min_limit})")]
    #[allow(missing_docs)]
    StartingInFlightTooHigh {
        starting_in_flight: usize,
        min_limit: usize,
    },
    #[error("fast_threshold must be greater than zero")]
    #[allow(missing_docs)]
    ZeroFastThreshold,
    #[error("slow_margin must be greater than zero")]
    #[allow(missing_docs)]
    ZeroSlowMargin,
}

impl Options {
    /// Check that these options describe a controller which can always make progress.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_limit == 0 {
            return Err(ConfigError::ZeroMinLimit);
        }
        if self.min_limit > self.limit {
            return Err(ConfigError::MinLimitAboveLimit {
                min_limit: self.min_limit,
                limit: self.limit,
            });
        }
        // Otherwise a limit resting at its floor could leave no slot to admit into.
        if self.starting_in_flight >= self.min_limit {
            return Err(ConfigError::StartingInFlightTooHigh {
                starting_in_flight: self.starting_in_flight,
                min_limit: self.min_limit,
            });
        }
        if self.fast_threshold.is_zero() {
            return Err(ConfigError::ZeroFastThreshold);
        }
        if self.slow_margin.is_zero() {
            return Err(ConfigError::ZeroSlowMargin);
        }
        Ok(())
    }

    /// Initial concurrency limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
    /// Floor for the concurrency limit.
    pub fn min_limit(&self) -> usize {
        self.min_limit
    }
    /// Slots considered occupied before anything has been admitted.
    pub fn starting_in_flight(&self) -> usize {
        self.starting_in_flight
    }
    /// Upper bound of the fast zone (exclusive).
    pub fn fast_threshold(&self) -> Duration {
        self.fast_threshold
    }
    /// Width of the dead zone above `fast_threshold`.
    pub fn slow_margin(&self) -> Duration {
        self.slow_margin
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::builder().build()
    }
}
