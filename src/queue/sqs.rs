//! Amazon SQS notification queue

use super::{NotificationQueue, QueueMessage};
use crate::config::QueueConfig;
use crate::error::QueueError;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::Client;
use aws_sdk_sqs::error::DisplayErrorContext;
use tracing::{debug, info};

/// SQS accepts at most this many messages per receive call
const MAX_MESSAGES_PER_RECEIVE: usize = 10;

/// [`NotificationQueue`] backed by an SQS queue looked up by name
#[derive(Clone, Debug)]
pub struct SqsQueue {
    client: Client,
    name: String,
    queue_url: String,
    wait_time_seconds: i32,
}

impl SqsQueue {
    /// Resolve the configured queue and build a client for it
    ///
    /// # Errors
    /// [`QueueError::Connect`] if the queue URL cannot be resolved (unknown queue,
    /// missing credentials, unreachable endpoint).
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        let client = Client::new(&sdk_config);

        let response = client
            .get_queue_url()
            .queue_name(&config.name)
            .send()
            .await
            .map_err(|e| QueueError::Connect {
                queue: config.name.clone(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        let queue_url = response.queue_url.ok_or_else(|| QueueError::Connect {
            queue: config.name.clone(),
            reason: "no queue URL returned".to_string(),
        })?;

        info!(queue = %config.name, url = %queue_url, region = %config.region, "connected to queue");

        Ok(Self {
            client,
            name: config.name.clone(),
            queue_url,
            wait_time_seconds: config.wait_time_seconds,
        })
    }
}

#[async_trait]
impl NotificationQueue for SqsQueue {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let max = max.clamp(1, MAX_MESSAGES_PER_RECEIVE) as i32;

        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(self.wait_time_seconds)
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        let messages: Vec<QueueMessage> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|message| QueueMessage {
                message_id: message.message_id.unwrap_or_default(),
                receipt_handle: message.receipt_handle.unwrap_or_default(),
                body: message.body.unwrap_or_default(),
            })
            .collect();

        debug!(queue = %self.name, count = messages.len(), "received messages");
        Ok(messages)
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete {
                message_id: message.message_id.clone(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        debug!(message_id = %message.message_id, "deleted message");
        Ok(())
    }

    async fn release(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .visibility_timeout(0)
            .send()
            .await
            .map_err(|e| QueueError::Release {
                message_id: message.message_id.clone(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        debug!(message_id = %message.message_id, "released message");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
