//! Exponential backoff and pausable waits

use std::time::Duration;

use crate::cancel::{CancelToken, Cancelled};

/// Bounded exponential backoff: `base × 2^attempt` (attempt counted from 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Backoff {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }

    /// Whether another attempt is allowed after `attempt` (0-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Something that can wait for a duration, honouring cancellation.
///
/// Production code uses [`SleepPause`]; tests substitute a recorder.
pub trait Pause: Send + Sync {
    fn pause(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Cancelled>;
}

/// Real wall-clock pause backed by [`CancelToken::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepPause;

impl Pause for SleepPause {
    fn pause(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Cancelled> {
        cancel.sleep(duration)
    }
}
