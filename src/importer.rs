//! Batch import: decode, annotate and deliver every record of one batch in order

use crate::decoder::BatchDecoder;
use crate::delivery::{DeliveryChannel, record_payload};
use crate::error::Result;
use crate::types::BatchReport;
use tracing::{debug, warn};

/// Turns one raw batch into ordered deliveries
///
/// Delivery stops at the first failing record and the whole batch fails: the batch
/// is the unit of retry, so it is never resumed part-way. Records the sink cannot
/// annotate are the one exception; they are logged and skipped.
pub struct RecordImporter {
    decoder: BatchDecoder,
    channel: DeliveryChannel,
}

impl RecordImporter {
    /// Create an importer delivering through `channel`
    pub fn new(channel: DeliveryChannel) -> Self {
        Self {
            decoder: BatchDecoder,
            channel,
        }
    }

    /// The delivery channel, for its counters
    pub fn channel(&self) -> &DeliveryChannel {
        &self.channel
    }

    /// Import one gzip-compressed batch
    ///
    /// # Errors
    /// - [`Error::Decode`](crate::Error::Decode) if the batch cannot be decoded; nothing is delivered.
    /// - [`Error::Delivery`](crate::Error::Delivery) for the first record that could not be delivered.
    pub async fn import_batch(&mut self, raw: &[u8]) -> Result<BatchReport> {
        let records = self.decoder.decode(raw)?;
        let mut report = BatchReport::default();

        for mut record in records {
            if let Err(e) = self.channel.prepare(&mut record) {
                warn!(
                    error = %e,
                    record = %record_payload(&record),
                    "record cannot be annotated, skipping"
                );
                report.skipped += 1;
                continue;
            }

            self.channel.deliver(&record).await?;
            report.delivered += 1;
        }

        debug!(
            delivered = report.delivered,
            skipped = report.skipped,
            "batch imported"
        );
        Ok(report)
    }

    /// Close the sink connection
    pub async fn close(&mut self) {
        self.channel.close().await;
    }
}
