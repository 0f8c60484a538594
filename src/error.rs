//! Error types for cloudtrail-relay
//!
//! This module provides the error taxonomy for the import pipeline:
//! - Stage-specific error types (decode, transform, fetch, delivery, queue, envelope)
//! - A top-level [`Error`] with `From` conversions so stages can use `?`
//! - Fatal/transient classification used to build an [`ImportOutcome`](crate::types::ImportOutcome)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cloudtrail-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cloudtrail-relay
///
/// Each variant wraps the error of one pipeline stage. Whether an error aborts the
/// whole process or only the current message is decided by [`Error::is_fatal`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "queue.batch_size")
        key: Option<String>,
    },

    /// A batch payload could not be decompressed or parsed
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A batch could not be read from its source location
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A record could not be delivered to the sink
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// A queue call (receive, delete, release) failed
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// A queue message body is not a recognizable notification
    #[error("invalid notification: {0}")]
    Envelope(#[from] EnvelopeError),

    /// The queue subscription has not been confirmed yet; the message was left for later
    #[error("subscription confirmation pending for message {message_id}")]
    SubscriptionPending {
        /// Identifier of the confirmation message
        message_id: String,
    },
}

impl Error {
    /// Create a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error must halt processing entirely
    ///
    /// Fatal errors are those after which continuing would either drop audit events
    /// (exhausted delivery retries) or break trust in the queue state (failed
    /// receive/delete). Everything else only fails the current unit of work.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Config { .. } => true,
            Error::Delivery(DeliveryError::Exhausted { .. }) => true,
            Error::Delivery(_) => false,
            Error::Queue(QueueError::Release { .. }) => false,
            Error::Queue(_) => true,
            Error::Fetch(FetchError::Unavailable(_)) => true,
            Error::Fetch(_) => false,
            Error::Decode(_) | Error::Envelope(_) | Error::SubscriptionPending { .. } => false,
        }
    }
}

/// Batch decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid gzip
    #[error("failed to decompress batch: {0}")]
    Decompress(#[source] std::io::Error),

    /// The decompressed payload is not valid JSON
    #[error("failed to parse batch JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// The `Records` field exists but is not an array of objects
    #[error("invalid Records field: {0}")]
    InvalidRecords(String),
}

/// Record annotation errors (indexed-store sink only)
#[derive(Debug, Error)]
pub enum TransformError {
    /// A field required to annotate the record is absent or not a string
    #[error("record is missing field {0}")]
    MissingField(&'static str),

    /// The event time could not be parsed
    #[error("invalid eventTime {value:?}: {source}")]
    InvalidTimestamp {
        /// The raw eventTime value
        value: String,
        /// The underlying parse error
        #[source]
        source: chrono::ParseError,
    },
}

/// Source fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// A local batch file could not be read
    #[error("failed to read {path}: {source}")]
    LocalRead {
        /// The file or directory that could not be read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The object does not exist in the bucket
    #[error("object s3://{bucket}/{key} not found")]
    NotFound {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
    },

    /// The object exists (or may exist) but could not be downloaded
    #[error("failed to fetch s3://{bucket}/{key}: {reason}")]
    Remote {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
        /// Description of the failure
        reason: String,
    },

    /// Listing a prefix failed
    #[error("failed to list s3://{bucket}/{prefix}: {reason}")]
    List {
        /// Bucket name
        bucket: String,
        /// Listed prefix
        prefix: String,
        /// Description of the failure
        reason: String,
    },

    /// Object storage cannot be reached at all (none configured, no response)
    #[error("object storage unavailable: {0}")]
    Unavailable(String),
}

/// Sink delivery errors
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The sink connection could not be established
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Sink address
        address: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing to an established connection failed
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The sink answered with a non-success status
    #[error("sink rejected record with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// The record lacks something the sink needs to route it
    #[error("record cannot be delivered: {0}")]
    InvalidRecord(String),

    /// Every delivery attempt failed
    #[error("failed to send record after {attempts} tries ({last_error}): {payload}")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// The serialized record that could not be sent
        payload: String,
        /// The error of the final attempt
        last_error: String,
    },
}

/// Notification queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue could not be resolved or connected to
    #[error("failed to connect to queue {queue}: {reason}")]
    Connect {
        /// Queue name
        queue: String,
        /// Description of the failure
        reason: String,
    },

    /// Receiving messages failed
    #[error("failed to receive messages: {0}")]
    Receive(String),

    /// Deleting a completed message failed
    #[error("failed to delete message {message_id}: {reason}")]
    Delete {
        /// Message identifier
        message_id: String,
        /// Description of the failure
        reason: String,
    },

    /// Making a message visible again failed
    #[error("failed to release message {message_id}: {reason}")]
    Release {
        /// Message identifier
        message_id: String,
        /// Description of the failure
        reason: String,
    },
}

/// Notification envelope errors
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The body (or its inner message) is not valid JSON
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required envelope field is absent
    #[error("missing field {0}")]
    MissingField(&'static str),

    /// A field has an unexpected type
    #[error("unexpected shape: {0}")]
    UnexpectedShape(String),
}
