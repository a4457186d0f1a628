//! Delay schedules between retries of transient failures.
//!
//! The default is a fixed pause between attempts. Exponential backoff with
//! jitter is available as an opt-in; it changes observable timing, so it is
//! never selected implicitly.

use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder};

/// Default pause between attempts after a transient failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default ceiling for exponential backoff.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// How long to wait before retrying a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDelay {
    /// The same delay before every retry.
    Fixed(Duration),
    /// Delay doubles from `min_delay` up to `max_delay`.
    Exponential {
        min_delay: Duration,
        max_delay: Duration,
        jitter: bool,
    },
}

impl Default for RetryDelay {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RETRY_DELAY)
    }
}

impl RetryDelay {
    /// Exponential backoff with jitter between `min_delay` and `max_delay`.
    #[must_use]
    pub fn exponential(min_delay: Duration, max_delay: Duration) -> Self {
        Self::Exponential {
            min_delay,
            max_delay,
            jitter: true,
        }
    }

    /// Build the delay sequence for one invocation with at most `max_retries`
    /// retries.
    #[must_use]
    pub fn schedule(self, max_retries: usize) -> DelaySchedule {
        match self {
            Self::Fixed(delay) => DelaySchedule {
                inner: Box::new(
                    ConstantBuilder::default()
                        .with_delay(delay)
                        .with_max_times(max_retries)
                        .build(),
                ),
                fallback: delay,
            },
            Self::Exponential {
                min_delay,
                max_delay,
                jitter,
            } => {
                let mut builder = ExponentialBuilder::default()
                    .with_min_delay(min_delay)
                    .with_max_delay(max_delay)
                    .with_max_times(max_retries);
                if jitter {
                    builder = builder.with_jitter();
                }
                DelaySchedule {
                    inner: Box::new(builder.build()),
                    fallback: max_delay,
                }
            }
        }
    }
}

/// Iterator over the delays of a single invocation.
pub struct DelaySchedule {
    inner: Box<dyn Iterator<Item = Duration> + Send>,
    fallback: Duration,
}

impl DelaySchedule {
    /// Next delay. Once the underlying schedule runs dry the last configured
    /// bound is reused.
    pub fn next_delay(&mut self) -> Duration {
        self.inner.next().unwrap_or(self.fallback)
    }
}

impl std::fmt::Debug for DelaySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelaySchedule")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}
