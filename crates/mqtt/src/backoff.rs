//! Exponential backoff schedule for publish retries.
//!
//! When a delivery attempt fails, the controller waits an exponentially
//! increasing amount of time before trying again rather than hammering a
//! broker that is likely mid-recovery. The schedule is the device's
//! power-of-two ladder:
//!
//! ```text
//! delay[k] = base * 2^k        (k = 1 for the first retry)
//! ```
//!
//! With the default 2 s base that gives 4 s, 8 s, 16 s. The device blocks
//! for the whole window — it has no other work to do during a retry.
//!
//! # Examples
//!
//! ```ignore
//! use std::time::Duration;
//! use soilcast_mqtt::Backoff;
//!
//! let mut backoff = Backoff::new(Duration::from_secs(2), 3);
//! assert_eq!(backoff.next_sleep().unwrap(), Duration::from_secs(4));
//! assert_eq!(backoff.next_sleep().unwrap(), Duration::from_secs(8));
//! ```

use std::time::Duration;

use thiserror::Error;

/// Error type for backoff exhaustion.
#[derive(Debug, Error)]
pub enum BackoffError {
    /// All permitted retries have been consumed. The field carries the
    /// configured limit.
    #[error("maximum number of retries exceeded: {0}")]
    Exhausted(u32),
}

/// Bounded exponential backoff with power-of-two growth.
///
/// Each call to [`next_sleep`](Backoff::next_sleep) consumes one retry and
/// returns the delay to wait before that retry. After `max_retries` calls
/// the schedule is exhausted and further calls fail.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Base delay multiplied by the power-of-two factor.
    base: Duration,

    /// Hard limit on retries handed out before exhaustion.
    max_retries: u32,

    /// Count of retries handed out so far (0 before the first).
    attempt: u32,
}

impl Backoff {
    /// Creates a schedule with the given base delay and retry limit.
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self {
            base,
            max_retries,
            attempt: 0,
        }
    }

    /// Computes the delay for retry `attempt` without consuming anything.
    ///
    /// `attempt` is 1-based: the first retry waits `base * 2`, the second
    /// `base * 4`, and so on. Saturates instead of overflowing for absurd
    /// attempt numbers.
    pub fn delay_for(base: Duration, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        base.saturating_mul(factor)
    }

    /// Returns the next delay and advances the schedule.
    ///
    /// # Returns
    /// - `Ok(Duration)`: sleep this long before the next retry
    /// - `Err(BackoffError)`: the retry budget is spent
    pub fn next_sleep(&mut self) -> Result<Duration, BackoffError> {
        if self.attempt >= self.max_retries {
            return Err(BackoffError::Exhausted(self.max_retries));
        }
        self.attempt += 1;
        Ok(Self::delay_for(self.base, self.attempt))
    }

    /// Resets the schedule to its initial state.
    ///
    /// Call after a successful delivery so the next failure starts the
    /// ladder from the bottom again.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Count of retries handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The configured retry limit.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
