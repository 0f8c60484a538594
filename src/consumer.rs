//! Queue consumption with at-least-once completion
//!
//! A message is deleted only after every batch it points at has been delivered in
//! full. Anything short of that leaves the message on the queue, where its visibility
//! timeout eventually makes it available again. For one received message:
//!
//! ```text
//! parse envelope ──malformed──────────────────────────────> Transient
//!   ├─ subscription confirmation ── release ──────────────> Transient
//!   ├─ validation ping ───────────────────────────────────> Success
//!   └─ batch pointer ── import key 1..n ── any failure ───> Transient | Fatal
//!                                        └─ all ok ───────> Success
//! Success ── delete (skipped in dry-run) ── delete fails ─> Fatal
//! ```

use crate::error::Error;
use crate::pipeline::Pipeline;
use crate::queue::{Notification, NotificationQueue, QueueMessage};
use crate::types::{ImportOutcome, ReceiveReport};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives queue messages through the import pipeline
pub struct QueueConsumer {
    queue: Arc<dyn NotificationQueue>,
    pipeline: Pipeline,
    dry_run: bool,
    received: u64,
    completed: u64,
}

impl QueueConsumer {
    /// Create a consumer
    ///
    /// Under `dry_run`, successful messages stay on the queue.
    pub fn new(queue: Arc<dyn NotificationQueue>, pipeline: Pipeline, dry_run: bool) -> Self {
        Self {
            queue,
            pipeline,
            dry_run,
            received: 0,
            completed: 0,
        }
    }

    /// Messages received so far
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Messages processed successfully so far
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// The import pipeline, for its counters
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Receive up to `max` messages and process them in receipt order
    ///
    /// Processing stops at the first message whose outcome is not
    /// [`ImportOutcome::Success`]; the remaining messages of the fetch are left
    /// untouched on the queue.
    pub async fn receive(&mut self, max: usize) -> ReceiveReport {
        let messages = match self.queue.receive(max).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, queue = %self.queue.name(), "receive failed");
                return ReceiveReport {
                    received: 0,
                    completed: 0,
                    outcome: ImportOutcome::from_error(e.into()),
                };
            }
        };

        let received = messages.len();
        self.received += received as u64;
        let mut completed = 0;

        for (position, message) in messages.iter().enumerate() {
            let outcome = self.process_message(message).await;
            if !outcome.is_success() {
                let left = received - position - 1;
                if left > 0 {
                    warn!(
                        left = left,
                        "leaving remaining messages of this fetch on the queue"
                    );
                }
                return ReceiveReport {
                    received,
                    completed,
                    outcome,
                };
            }
            completed += 1;
        }

        ReceiveReport {
            received,
            completed,
            outcome: ImportOutcome::Success,
        }
    }

    /// Process one message and settle it on the queue
    pub async fn process_message(&mut self, message: &QueueMessage) -> ImportOutcome {
        let outcome = self.handle(message).await;

        match &outcome {
            ImportOutcome::Success => {}
            ImportOutcome::Transient(e) => {
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "message left on queue for redelivery"
                );
                return outcome;
            }
            ImportOutcome::Fatal(e) => {
                error!(message_id = %message.message_id, error = %e, "fatal error");
                return outcome;
            }
        }

        if self.dry_run {
            debug!(message_id = %message.message_id, "dry run: message not deleted");
        } else if let Err(e) = self.queue.delete(message).await {
            error!(message_id = %message.message_id, error = %e, "failed to delete completed message");
            return ImportOutcome::Fatal(e.into());
        }

        self.completed += 1;
        ImportOutcome::Success
    }

    async fn handle(&mut self, message: &QueueMessage) -> ImportOutcome {
        let notification = match Notification::parse(&message.body) {
            Ok(notification) => notification,
            Err(e) => {
                error!(
                    message_id = %message.message_id,
                    body = %message.body,
                    error = %e,
                    "malformed notification"
                );
                return ImportOutcome::Transient(e.into());
            }
        };

        match notification {
            Notification::SubscriptionConfirmation => {
                info!(
                    message_id = %message.message_id,
                    "waiting for subscription confirmation, releasing message"
                );
                if let Err(e) = self.queue.release(message).await {
                    warn!(message_id = %message.message_id, error = %e, "failed to release message");
                }
                ImportOutcome::Transient(Error::SubscriptionPending {
                    message_id: message.message_id.clone(),
                })
            }
            Notification::ValidationPing => {
                info!(message_id = %message.message_id, "received CloudTrail validation message");
                ImportOutcome::Success
            }
            Notification::BatchPointer(pointer) => {
                ImportOutcome::from(self.pipeline.import_pointer(&pointer).await)
            }
        }
    }
}
