//! Retry schedule for record delivery
//!
//! Delivery retries are driven by [`DeliveryChannel`](crate::delivery::DeliveryChannel),
//! which has to tear down and re-establish its connection between attempts. This module
//! only supplies the two pieces that loop needs:
//! - [`IsRetryable`] to tell transient failures from permanent ones
//! - [`Backoff`] to compute the delay before each retry
//!
//! # Example
//!
//! ```
//! use cloudtrail_relay::config::RetryConfig;
//! use cloudtrail_relay::retry::Backoff;
//! use std::time::Duration;
//!
//! let config = RetryConfig::default();
//! let mut backoff = Backoff::new(&config);
//! assert_eq!(backoff.next_delay(), Duration::from_secs(10));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(10));
//! ```

use crate::config::RetryConfig;
use crate::error::DeliveryError;
use rand::Rng;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (connection refused, reset, timeouts, overloaded sink) should
/// return `true`. Failures that will repeat identically on every attempt (a record the
/// sink refuses, a record missing its routing fields) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for DeliveryError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection setup and socket writes are the classic transient failures
            DeliveryError::Connect { .. } | DeliveryError::Io(_) => true,
            // Transport-level HTTP failures, but not request building/body errors
            DeliveryError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            // Overloaded or unavailable sink
            DeliveryError::Rejected { status, .. } => *status == 429 || *status >= 500,
            DeliveryError::InvalidRecord(_) => false,
            DeliveryError::Exhausted { .. } => false,
        }
    }
}

/// Delay schedule between delivery attempts
///
/// Starts at `initial_delay`, multiplies by `backoff_multiplier` after every retry and
/// is capped at `max_delay`. With the default configuration this is a fixed 10 second
/// pause.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Backoff {
    /// Start a new schedule
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            delay: config.initial_delay.min(config.max_delay),
            max_delay: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }

    /// Delay to wait before the next retry
    pub fn next_delay(&mut self) -> Duration {
        let current = self.delay;

        let next = Duration::from_secs_f64(current.as_secs_f64() * self.multiplier);
        self.delay = next.min(self.max_delay);

        if self.jitter {
            add_jitter(current)
        } else {
            current
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay.
/// This means the actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
