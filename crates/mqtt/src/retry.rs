//! Publish-with-retry controller.
//!
//! Wraps a [`Link`] and turns a single fallible publish into a bounded
//! sequence of tries with exponential backoff between them. The policy
//! trades latency for reliability within one acquisition cycle: the device
//! has no concurrent work, so blocking for the whole backoff window is the
//! intended behavior, and once a sequence starts it runs to success or
//! exhaustion.
//!
//! A publish makes `max_retries + 1` total tries. Before retry k the
//! controller sleeps `base * 2^k` and re-establishes the session if it
//! dropped. If the link is down when the sequence starts, one connect is
//! attempted; if that fails the sequence is abandoned without consuming
//! any tries — there is no point retrying a publish that cannot even reach
//! the handshake.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{backoff::Backoff, error::PublishError, Link};

/// Retry policy for one publish sequence.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Base delay of the backoff ladder.
    pub base_delay: Duration,

    /// Retries permitted after the first try.
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Builds the policy from the transport configuration.
    pub fn from_config(config: &super::Config) -> Self {
        Self {
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_retries: config.max_retries,
        }
    }
}

/// Drives a [`Link`] with bounded retries and exponential backoff.
pub struct RetryPublisher<L: Link> {
    link: L,
    policy: RetryPolicy,
    last_retries: u32,
}

impl<L: Link> RetryPublisher<L> {
    pub fn new(link: L, policy: RetryPolicy) -> Self {
        Self {
            link,
            policy,
            last_retries: 0,
        }
    }

    /// Read access to the underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable access to the underlying link, for connect and service
    /// calls made outside a publish sequence.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Retries consumed by the most recent publish sequence.
    pub fn last_retries(&self) -> u32 {
        self.last_retries
    }

    /// Publishes one payload, retrying with backoff until acknowledged or
    /// exhausted.
    ///
    /// # Returns
    /// - `Ok(retries)`: delivered; `retries` is how many retries it took
    ///   (0 when the first try succeeded).
    /// - `Err(PublishError::ConnectFailed)`: no session could be
    ///   established, no delivery was attempted.
    /// - `Err(PublishError::Exhausted)`: every permitted try failed.
    pub async fn publish(&mut self, payload: &[u8]) -> Result<u32, PublishError> {
        if !self.link.is_connected() {
            debug!("not connected, attempting to connect before publish");
            if let Err(e) = self.link.connect().await {
                return Err(PublishError::ConnectFailed {
                    reason: e.to_string(),
                });
            }
        }

        self.last_retries = 0;
        let mut backoff = Backoff::new(self.policy.base_delay, self.policy.max_retries);
        let total_tries = self.policy.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 0..total_tries {
            if attempt > 0 {
                // next_sleep cannot exhaust inside the loop bounds.
                let delay = match backoff.next_sleep() {
                    Ok(delay) => delay,
                    Err(e) => {
                        return Err(PublishError::Exhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        })
                    }
                };
                self.last_retries = attempt;
                info!(
                    "retry attempt {}/{} after {:.1}s",
                    attempt,
                    self.policy.max_retries,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;

                if !self.link.is_connected() {
                    // Best effort: a failed reconnect still burns this try.
                    let _ = self.link.connect().await;
                }
            }

            match self.link.publish(payload).await {
                Ok(()) => {
                    debug!("publish succeeded on try {}/{}", attempt + 1, total_tries);
                    return Ok(attempt);
                }
                Err(e) => {
                    warn!("publish try {}/{} failed: {e}", attempt + 1, total_tries);
                    last_error = e.to_string();
                }
            }
        }

        self.last_retries = self.policy.max_retries;
        Err(PublishError::Exhausted {
            attempts: total_tries,
            last_error,
        })
    }
}
