//! Notification queue collaborators
//!
//! CloudTrail publishes "new batch" notifications through SNS into a queue. The
//! [`NotificationQueue`] trait is the narrow surface the consumer needs: receive,
//! delete after success, and release (make visible again) for messages that must be
//! retried by someone else.

mod envelope;
mod sqs;

pub use envelope::{BatchPointer, Notification, VALIDATION_MESSAGE};
pub use sqs::SqsQueue;

use crate::error::QueueError;
use async_trait::async_trait;

/// One message as received from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Queue-assigned message identifier, for logging
    pub message_id: String,
    /// Handle used to delete or release this delivery of the message
    pub receipt_handle: String,
    /// Raw message body (the SNS envelope)
    pub body: String,
}

/// Trait for notification queues
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Receive up to `max` messages; an empty vector means the queue is drained
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError>;

    /// Permanently remove a processed message
    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError>;

    /// Make a received message immediately visible to other consumers
    async fn release(&self, message: &QueueMessage) -> Result<(), QueueError>;

    /// Queue name, for logging
    fn name(&self) -> &str;
}
