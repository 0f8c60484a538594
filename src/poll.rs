//! Poll loop over a [`QueueConsumer`]
//!
//! In unbounded mode the loop moves between three states:
//!
//! ```text
//!            ┌──── queue empty / transient outcome ────┐
//!            v                                         │
//!  Draining ─┴─> (no poll interval) ──> Halted         │
//!     ^                                                │
//!     └──── poll interval elapsed ──── Idle <──────────┘
//! ```
//!
//! A fatal outcome or a stop signal moves to Halted from any state. The stop signal
//! is only observed between receive calls, so a message is never abandoned part-way.

use crate::config::QueueConfig;
use crate::consumer::QueueConsumer;
use crate::error::Result;
use crate::types::{ImportOutcome, PollSummary, ReceiveReport};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long the loop keeps receiving
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollMode {
    /// Handle up to `messages` messages, then return
    Bounded {
        /// Number of messages to handle
        messages: usize,
    },
    /// Drain the queue; repeat after `poll_interval` if one is set
    Unbounded {
        /// Pause between drain cycles
        poll_interval: Option<Duration>,
    },
}

impl PollMode {
    /// Bounded when a positive message count is requested, unbounded otherwise
    pub fn from_config(config: &QueueConfig, messages: Option<usize>) -> Self {
        match messages {
            Some(messages) if messages > 0 => PollMode::Bounded { messages },
            _ => PollMode::Unbounded {
                poll_interval: config.poll_interval,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PollState {
    Draining,
    Idle(Duration),
    Halted,
}

/// Repeatedly receives from the queue according to a [`PollMode`]
pub struct PollLoop {
    consumer: QueueConsumer,
    mode: PollMode,
    batch_size: usize,
    stop: CancellationToken,
}

impl PollLoop {
    /// Create a loop receiving at most `batch_size` messages per call
    pub fn new(consumer: QueueConsumer, mode: PollMode, batch_size: usize) -> Self {
        Self {
            consumer,
            mode,
            batch_size: batch_size.max(1),
            stop: CancellationToken::new(),
        }
    }

    /// Stop when `token` is cancelled
    pub fn with_stop_token(mut self, token: CancellationToken) -> Self {
        self.stop = token;
        self
    }

    /// Token that stops the loop when cancelled
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Run until the mode is satisfied, a stop is requested, or a fatal error occurs
    ///
    /// # Errors
    /// Returns the error behind the first fatal outcome.
    pub async fn run(&mut self) -> Result<PollSummary> {
        let mut summary = PollSummary::default();

        match self.mode {
            PollMode::Bounded { messages } => self.run_bounded(messages, &mut summary).await?,
            PollMode::Unbounded { poll_interval } => {
                self.run_unbounded(poll_interval, &mut summary).await?
            }
        }

        info!(
            cycles = summary.cycles,
            received = summary.received,
            completed = summary.completed,
            stopped = summary.stopped,
            "poll loop finished"
        );
        Ok(summary)
    }

    async fn run_bounded(&mut self, messages: usize, summary: &mut PollSummary) -> Result<()> {
        summary.cycles = 1;
        let mut remaining = messages;

        while remaining > 0 {
            if self.stop.is_cancelled() {
                summary.stopped = true;
                break;
            }

            let report = self.consumer.receive(remaining.min(self.batch_size)).await;
            let received = report.received;
            if !settle(report, summary)? || received == 0 {
                break;
            }
            remaining = remaining.saturating_sub(received);
        }
        Ok(())
    }

    async fn run_unbounded(
        &mut self,
        poll_interval: Option<Duration>,
        summary: &mut PollSummary,
    ) -> Result<()> {
        let mut state = PollState::Draining;
        summary.cycles = 1;

        loop {
            state = match state {
                PollState::Halted => return Ok(()),
                _ if self.stop.is_cancelled() => {
                    summary.stopped = true;
                    PollState::Halted
                }
                PollState::Draining => {
                    let report = self.consumer.receive(self.batch_size).await;
                    let received = report.received;
                    if settle(report, summary)? && received > 0 {
                        PollState::Draining
                    } else {
                        match poll_interval {
                            Some(interval) => PollState::Idle(interval),
                            None => PollState::Halted,
                        }
                    }
                }
                PollState::Idle(interval) => {
                    info!(seconds = interval.as_secs(), "queue drained, sleeping");
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            summary.cycles += 1;
                            debug!(cycle = summary.cycles, "starting drain cycle");
                            PollState::Draining
                        }
                        _ = self.stop.cancelled() => {
                            summary.stopped = true;
                            PollState::Halted
                        }
                    }
                }
            };
        }
    }
}

/// Fold a receive report into the summary
///
/// Returns whether the cycle may continue, or the error of a fatal outcome.
fn settle(report: ReceiveReport, summary: &mut PollSummary) -> Result<bool> {
    summary.received += report.received as u64;
    summary.completed += report.completed as u64;

    match report.outcome {
        ImportOutcome::Success => Ok(true),
        ImportOutcome::Transient(e) => {
            warn!(error = %e, "ending drain cycle after transient failure");
            Ok(false)
        }
        ImportOutcome::Fatal(e) => Err(e),
    }
}
