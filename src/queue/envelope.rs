//! SNS notification envelopes
//!
//! Queue messages are SNS envelopes of the form
//!
//! ```json
//! {"Type": "Notification", "Message": "{\"s3Bucket\":\"trail\",\"s3ObjectKey\":[\"a.json.gz\"]}"}
//! ```
//!
//! where `Message` is itself a JSON document encoded as a string.

use crate::error::EnvelopeError;
use serde::Deserialize;
use serde_json::Value;

/// `Message` text CloudTrail sends when a trail is first wired to a topic
pub const VALIDATION_MESSAGE: &str = "CloudTrail validation message.";

const SUBSCRIPTION_CONFIRMATION: &str = "SubscriptionConfirmation";

/// Where the batches announced by a notification live
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchPointer {
    /// Bucket holding the batches
    #[serde(rename = "s3Bucket")]
    pub bucket: String,
    /// Object keys, in delivery order
    #[serde(rename = "s3ObjectKey")]
    pub keys: Vec<String>,
}

/// A classified queue message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The SNS subscription has not been confirmed; nothing to import
    SubscriptionConfirmation,
    /// Connectivity check sent by CloudTrail; nothing to import
    ValidationPing,
    /// New batches are available
    BatchPointer(BatchPointer),
}

impl Notification {
    /// Classify a raw message body
    ///
    /// # Errors
    /// [`EnvelopeError`] if the body is not JSON, lacks `Type`/`Message`, or the
    /// inner message is not a batch pointer.
    pub fn parse(body: &str) -> Result<Self, EnvelopeError> {
        let envelope: Value = serde_json::from_str(body)?;

        let kind = envelope
            .get("Type")
            .ok_or(EnvelopeError::MissingField("Type"))?
            .as_str()
            .ok_or_else(|| EnvelopeError::UnexpectedShape("Type is not a string".to_string()))?;

        if kind == SUBSCRIPTION_CONFIRMATION {
            return Ok(Notification::SubscriptionConfirmation);
        }

        let message = envelope
            .get("Message")
            .ok_or(EnvelopeError::MissingField("Message"))?
            .as_str()
            .ok_or_else(|| {
                EnvelopeError::UnexpectedShape("Message is not a string".to_string())
            })?;

        if is_validation_message(message) {
            return Ok(Notification::ValidationPing);
        }

        let pointer: BatchPointer = serde_json::from_str(message)?;
        Ok(Notification::BatchPointer(pointer))
    }
}

/// The ping arrives either as bare text or as a JSON string literal
fn is_validation_message(message: &str) -> bool {
    message == VALIDATION_MESSAGE
        || serde_json::from_str::<String>(message).is_ok_and(|text| text == VALIDATION_MESSAGE)
}
