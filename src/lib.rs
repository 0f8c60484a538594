//! # cloudtrail-relay
//!
//! Imports AWS CloudTrail audit events into a log sink.
//!
//! CloudTrail writes batches of events as gzip-compressed JSON objects into S3 and
//! announces each new batch through SNS into an SQS queue. This crate consumes those
//! notifications, fetches the batches, and delivers every record, in order, to either
//! a newline-delimited JSON TCP endpoint or an HTTP indexed store.
//!
//! ## Delivery guarantee
//!
//! A queue message is deleted only after every record of every batch it points at
//! has been delivered. Failures leave the message on the queue for redelivery, so
//! records may be delivered more than once but are never silently dropped. When a
//! record cannot be delivered after the configured number of attempts, processing
//! halts with an error that carries the record.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cloudtrail_relay::{
//!     Config, DeliveryChannel, Pipeline, PollLoop, PollMode, QueueConsumer, RecordImporter,
//!     S3ObjectStore, SourceResolver, SqsQueue, build_sink,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     let channel = DeliveryChannel::new(build_sink(&config.sink)?, &config.delivery, false);
//!     let store = S3ObjectStore::from_config(&config.storage).await;
//!     let pipeline = Pipeline::new(
//!         RecordImporter::new(channel),
//!         SourceResolver::new(Arc::new(store)),
//!     );
//!
//!     let queue = SqsQueue::connect(&config.queue).await?;
//!     let consumer = QueueConsumer::new(Arc::new(queue), pipeline, false);
//!     let mode = PollMode::from_config(&config.queue, None);
//!
//!     let summary = PollLoop::new(consumer, mode, config.queue.batch_size).run().await?;
//!     println!("completed {} messages", summary.completed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Queue consumption and message settlement
pub mod consumer;
/// Batch decoding
pub mod decoder;
/// Resilient record delivery
pub mod delivery;
/// Error types
pub mod error;
/// Batch import
pub mod importer;
/// Import actions over batch locations
pub mod pipeline;
/// Poll loop
pub mod poll;
/// Notification queues
pub mod queue;
/// Retry schedule and retryable classification
pub mod retry;
/// Record sinks
pub mod sink;
/// Batch sources
pub mod source;
/// Record annotation
pub mod transform;
/// Core types
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, DeliveryConfig, QueueConfig, RetryConfig, SinkConfig, StorageConfig};
pub use consumer::QueueConsumer;
pub use decoder::BatchDecoder;
pub use delivery::DeliveryChannel;
pub use error::{
    DecodeError, DeliveryError, EnvelopeError, Error, FetchError, QueueError, Result,
    TransformError,
};
pub use importer::RecordImporter;
pub use pipeline::Pipeline;
pub use poll::{PollLoop, PollMode};
pub use queue::{BatchPointer, Notification, NotificationQueue, QueueMessage, SqsQueue};
pub use sink::{IndexSink, Sink, StreamSink, build_sink};
pub use source::{ObjectStore, S3ObjectStore, SourceResolver};
pub use types::{BatchReport, ImportOutcome, ImportSummary, PollSummary, Record, ReceiveReport};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal
///
/// Listens for SIGTERM (Unix only) and SIGINT / Ctrl+C. A listener that cannot be
/// installed never fires, so a registration failure does not stop the loop.
///
/// Pass the token to [`PollLoop::with_stop_token`] so the loop finishes the message
/// in hand and then returns.
///
/// # Example
///
/// ```no_run
/// use cloudtrail_relay::cancel_on_signal;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let token = CancellationToken::new();
///     tokio::spawn(cancel_on_signal(token.clone()));
///     token.cancelled().await;
/// }
/// ```
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("stopping after the current message");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            _ = interrupt() => {}
        },
        Err(e) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            interrupt().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    interrupt().await;
}

/// Resolves on SIGINT / Ctrl+C; never resolves if the handler cannot be installed
async fn interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received SIGINT"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    }
}
