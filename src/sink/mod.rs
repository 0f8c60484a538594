//! Sink collaborators that records are delivered to
//!
//! Two variants exist:
//! - [`StreamSink`]: newline-delimited JSON over one TCP connection
//! - [`IndexSink`]: one HTTP POST per record into monthly per-account indices
//!
//! Both sit behind the [`Sink`] trait so that [`DeliveryChannel`](crate::delivery::DeliveryChannel)
//! can own the connection lifecycle and retry policy independently of the transport.

mod index;
mod stream;

pub use index::IndexSink;
pub use stream::StreamSink;

use crate::config::SinkConfig;
use crate::error::{DeliveryError, Result, TransformError};
use crate::types::Record;
use async_trait::async_trait;

/// Trait for record sinks
///
/// A sink holds at most one live connection. [`connect`](Sink::connect) establishes it,
/// [`disconnect`](Sink::disconnect) tears it down, and [`send`](Sink::send) transmits a
/// single record over it. Callers never share a sink between tasks.
#[async_trait]
pub trait Sink: Send {
    /// Adjust a record before delivery
    ///
    /// Runs even in dry-run mode. A failure here means the record cannot be routed
    /// by this sink; the importer skips it rather than failing the batch.
    fn prepare(&self, _record: &mut Record) -> std::result::Result<(), TransformError> {
        Ok(())
    }

    /// Establish the connection
    async fn connect(&mut self) -> std::result::Result<(), DeliveryError>;

    /// Whether a connection is currently established
    fn is_connected(&self) -> bool;

    /// Transmit one record over the established connection
    async fn send(&mut self, record: &Record) -> std::result::Result<(), DeliveryError>;

    /// Tear down the connection, ignoring errors
    async fn disconnect(&mut self);

    /// Called after every `progress_interval` deliveries
    async fn checkpoint(&mut self) {}

    /// Human-readable name for logging
    fn name(&self) -> &'static str;

    /// Address of the endpoint, for logging
    fn address(&self) -> &str;
}

/// Build the sink described by the configuration
///
/// No connection is made here; the first delivery connects.
pub fn build_sink(config: &SinkConfig) -> Result<Box<dyn Sink>> {
    match config {
        SinkConfig::Stream { address } => Ok(Box::new(StreamSink::new(address.clone()))),
        SinkConfig::Index {
            address,
            index_prefix,
            mapping,
            request_timeout,
        } => Ok(Box::new(IndexSink::new(
            address,
            index_prefix.clone(),
            mapping.clone(),
            *request_timeout,
        )?)),
    }
}
