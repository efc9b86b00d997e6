//! Poll delay that stretches on consecutive transient failures.

use std::time::Duration;

/// Upper bound for the stretched delay, unless the interval itself is longer.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Exponential backoff between poll ticks.
///
/// Starts at the subscription interval and doubles on each failure up to the
/// cap. Resets to the interval on success.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    current_delay: Duration,
    max_delay: Duration,
    failure_count: u32,
}

impl ExponentialBackoff {
    /// Backoff for a subscription polling every `interval`.
    pub fn for_interval(interval: Duration) -> Self {
        Self::with_config(interval, interval.max(MAX_BACKOFF))
    }

    pub fn with_config(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            current_delay: base_delay,
            max_delay,
            failure_count: 0,
        }
    }

    /// Record a failure and double the delay, up to the cap.
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.current_delay = self.current_delay.saturating_mul(2).min(self.max_delay);
    }

    /// Back to the base delay.
    pub fn reset(&mut self) {
        self.failure_count = 0;
        self.current_delay = self.base_delay;
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Delay before the next tick.
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }
}
