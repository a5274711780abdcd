//! Reconnect backoff policy
//!
//! One parameterized policy shared by the market-data and private trading
//! stream clients. The delay doubles per attempt up to a cap; attempts stop
//! permanently once the budget is exhausted.

use std::time::Duration;

/// Exponential backoff with a cap and a hard attempt limit.
///
/// `delay(attempt) = min(base_delay * 2^(attempt - 1), max_delay)` for
/// attempts `1..=max_attempts`; anything past the budget yields `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt
    pub base_delay: Duration,

    /// Upper bound applied to every computed delay
    pub max_delay: Duration,

    /// Number of reconnect attempts before giving up permanently
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    ///
    /// Returns `None` once the attempt budget is exhausted; the caller must
    /// stop reconnecting at that point.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        // 2^31 still fits in u32; anything larger is far past any sane cap
        let factor = 2u32.pow((attempt - 1).min(31));
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}
