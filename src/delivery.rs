//! Resilient, ordered delivery of records to a sink
//!
//! [`DeliveryChannel`] owns the only sink connection of the process. It connects on
//! first use, reuses the connection for every following record, and rebuilds it in
//! place when a send fails:
//!
//! ```text
//! attempt 1 ── fail ──> sleep ──> disconnect ──> attempt 2 (reconnect + send) ── ...
//!                                                 ... attempt N ── fail ──> Exhausted
//! ```
//!
//! A failed reconnect counts as a failed attempt. Exhausting every attempt yields
//! [`DeliveryError::Exhausted`], which carries the record payload; the caller treats it
//! as fatal because skipping the record would silently drop an audit event.

use crate::config::{DeliveryConfig, RetryConfig};
use crate::error::{DeliveryError, TransformError};
use crate::retry::{Backoff, IsRetryable};
use crate::sink::Sink;
use crate::types::Record;
use tracing::{error, info, warn};

/// Sends records one at a time over a persistent, self-healing sink connection
pub struct DeliveryChannel {
    sink: Box<dyn Sink>,
    retry: RetryConfig,
    progress_interval: u64,
    dry_run: bool,
    delivered: u64,
}

impl DeliveryChannel {
    /// Create a channel over `sink`
    ///
    /// With `dry_run` set, the sink is never connected: records are logged and counted
    /// as delivered.
    pub fn new(sink: Box<dyn Sink>, config: &DeliveryConfig, dry_run: bool) -> Self {
        Self {
            sink,
            retry: config.retry.clone(),
            progress_interval: config.progress_interval.max(1),
            dry_run,
            delivered: 0,
        }
    }

    /// Number of records delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Let the sink annotate a record before delivery
    pub fn prepare(&self, record: &mut Record) -> Result<(), TransformError> {
        self.sink.prepare(record)
    }

    /// Deliver one record
    ///
    /// # Errors
    /// - A non-retryable sink error (e.g. the sink refuses the record) is returned as is.
    /// - [`DeliveryError::Exhausted`] once `max_attempts` retryable failures occurred.
    pub async fn deliver(&mut self, record: &Record) -> Result<(), DeliveryError> {
        if self.dry_run {
            info!(record = %record_payload(record), "dry run: record not sent");
        } else {
            self.send_with_retry(record).await?;
        }

        self.delivered += 1;
        if self.delivered % self.progress_interval == 0 {
            info!(records = self.delivered, "records imported");
            if !self.dry_run {
                self.sink.checkpoint().await;
            }
        }
        Ok(())
    }

    /// Close the sink connection, if any
    pub async fn close(&mut self) {
        self.sink.disconnect().await;
    }

    async fn send_with_retry(&mut self, record: &Record) -> Result<(), DeliveryError> {
        let mut backoff = Backoff::new(&self.retry);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.try_send(record).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(attempts = attempt, "record sent after retry");
                    }
                    return Ok(());
                }
                Err(e) if !e.is_retryable() => {
                    error!(
                        error = %e,
                        sink = self.sink.name(),
                        "sink refused record, not retrying"
                    );
                    return Err(e);
                }
                Err(e) if attempt >= self.retry.max_attempts => {
                    error!(
                        error = %e,
                        attempts = attempt,
                        sink = self.sink.name(),
                        address = %self.sink.address(),
                        "record could not be sent, all attempts exhausted"
                    );
                    self.sink.disconnect().await;
                    return Err(DeliveryError::Exhausted {
                        attempts: attempt,
                        payload: record_payload(record),
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        error = %e,
                        attempt = attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis(),
                        address = %self.sink.address(),
                        "send failed, reconnecting before retry"
                    );
                    tokio::time::sleep(delay).await;
                    self.sink.disconnect().await;
                }
            }
        }
    }

    async fn try_send(&mut self, record: &Record) -> Result<(), DeliveryError> {
        if !self.sink.is_connected() {
            self.sink.connect().await?;
        }
        self.sink.send(record).await
    }
}

/// Serialized form of a record for diagnostics
pub(crate) fn record_payload(record: &Record) -> String {
    serde_json::to_string(record).unwrap_or_else(|e| format!("<unserializable record: {}>", e))
}
