//! Core types for cloudtrail-relay

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// One audit event: a JSON object as found in a batch's `Records` array
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Result of processing one queue notification (or one receive call)
#[derive(Debug)]
pub enum ImportOutcome {
    /// Every record of every referenced batch was delivered
    Success,
    /// A recoverable failure; the message must stay on the queue for redelivery
    Transient(Error),
    /// An unrecoverable failure; processing must halt entirely
    Fatal(Error),
}

impl ImportOutcome {
    /// Classify an error as a transient or fatal outcome
    pub fn from_error(error: Error) -> Self {
        if error.is_fatal() {
            ImportOutcome::Fatal(error)
        } else {
            ImportOutcome::Transient(error)
        }
    }

    /// Whether the outcome is [`ImportOutcome::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, ImportOutcome::Success)
    }

    /// Whether the outcome is [`ImportOutcome::Fatal`]
    pub fn is_fatal(&self) -> bool {
        matches!(self, ImportOutcome::Fatal(_))
    }
}

impl<T> From<crate::error::Result<T>> for ImportOutcome {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(_) => ImportOutcome::Success,
            Err(e) => ImportOutcome::from_error(e),
        }
    }
}

/// Counters for one imported batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Records handed to the sink (or logged, under dry-run)
    pub delivered: u64,
    /// Records dropped because they could not be annotated for the sink
    pub skipped: u64,
}

/// Counters for a direct import action (file, folder, object, prefix)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Batches fully imported
    pub batches: u64,
    /// Records delivered across all batches
    pub delivered: u64,
    /// Records skipped across all batches
    pub skipped: u64,
}

impl ImportSummary {
    /// Fold one batch's counters into the summary
    pub fn add(&mut self, report: BatchReport) {
        self.batches += 1;
        self.delivered += report.delivered;
        self.skipped += report.skipped;
    }
}

/// Counters for one receive call on the queue
#[derive(Debug)]
pub struct ReceiveReport {
    /// Messages returned by the queue
    pub received: usize,
    /// Messages processed successfully (and deleted, unless dry-run)
    pub completed: usize,
    /// Outcome of the call: Success only if every received message succeeded
    pub outcome: ImportOutcome,
}

/// Totals reported by the poll loop when it stops
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    /// Drain cycles started
    pub cycles: u64,
    /// Messages received
    pub received: u64,
    /// Messages completed
    pub completed: u64,
    /// Whether the loop stopped because of a stop signal
    pub stopped: bool,
}
