//! Main execution logic for the cloudtrail-relay CLI.

use anyhow::{Context, Result};
use cloudtrail_relay::{
    Config, DeliveryChannel, ImportSummary, Pipeline, PollLoop, PollMode, PollSummary,
    QueueConsumer, RecordImporter, S3ObjectStore, SinkConfig, SourceResolver, SqsQueue,
    build_sink, cancel_on_signal,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::fmt;

use crate::args::{Cli, LogLevel, SinkKind};

/// Initialize logging.
pub fn init_logging(level: LogLevel) -> Result<()> {
    let level: Level = level.into();

    let subscriber = fmt::Subscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    subscriber.init();

    Ok(())
}

/// The single action requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    File(PathBuf),
    Folder(PathBuf),
    S3File { bucket: String, key: String },
    S3Folder { bucket: String, prefix: String },
    Sqs,
}

impl Action {
    fn from_cli(args: &Cli) -> Result<Self> {
        let bucket = || {
            args.s3_bucket
                .clone()
                .context("--s3-bucket is required for S3 imports")
        };

        if let Some(path) = &args.import_file {
            Ok(Action::File(path.clone()))
        } else if let Some(dir) = &args.import_folder {
            Ok(Action::Folder(dir.clone()))
        } else if let Some(key) = &args.import_s3_file {
            Ok(Action::S3File {
                bucket: bucket()?,
                key: key.clone(),
            })
        } else if let Some(prefix) = &args.import_s3_folder {
            Ok(Action::S3Folder {
                bucket: bucket()?,
                prefix: prefix.clone(),
            })
        } else if args.import_sqs.is_some() {
            Ok(Action::Sqs)
        } else {
            anyhow::bail!("no import action given")
        }
    }

    fn needs_object_store(&self) -> bool {
        !matches!(self, Action::File(_) | Action::Folder(_))
    }
}

/// What an action accomplished
#[derive(Debug)]
pub enum Report {
    Import(ImportSummary),
    Poll(PollSummary),
}

impl Report {
    /// Print the summary to stderr
    pub fn print(&self) {
        eprintln!();
        match self {
            Report::Import(summary) => {
                eprintln!("Import completed:");
                eprintln!("  Batches imported:  {}", summary.batches);
                eprintln!("  Records delivered: {}", summary.delivered);
                eprintln!("  Records skipped:   {}", summary.skipped);
            }
            Report::Poll(summary) => {
                eprintln!("Queue import completed:");
                eprintln!("  Drain cycles:       {}", summary.cycles);
                eprintln!("  Messages received:  {}", summary.received);
                eprintln!("  Messages completed: {}", summary.completed);
                if summary.stopped {
                    eprintln!("  Stopped by signal");
                }
            }
        }
    }
}

/// Layer command-line flags over the configuration file (or the defaults)
pub fn build_config(args: &Cli) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(kind) = args.sink {
        let same_kind = matches!(
            (kind, &config.sink),
            (SinkKind::Stream, SinkConfig::Stream { .. })
                | (SinkKind::Index, SinkConfig::Index { .. })
        );
        if !same_kind {
            config.sink = match kind {
                SinkKind::Stream => SinkConfig::default(),
                SinkKind::Index => SinkConfig::default_index(),
            };
        }
    }
    if let Some(new_address) = &args.sink_address {
        match &mut config.sink {
            SinkConfig::Stream { address } | SinkConfig::Index { address, .. } => {
                *address = new_address.clone();
            }
        }
    }

    if let Some(name) = &args.import_sqs {
        config.queue.name = name.clone();
    }
    if let Some(region) = &args.sqs_region {
        config.queue.region = region.clone();
    }
    if let Some(seconds) = args.sqs_poll_interval {
        config.queue.poll_interval = (seconds > 0).then(|| Duration::from_secs(seconds));
    }
    if let Some(endpoint) = &args.sqs_endpoint {
        config.queue.endpoint_url = Some(endpoint.clone());
    }

    if let Some(region) = &args.s3_region {
        config.storage.region = Some(region.clone());
    }
    if let Some(endpoint) = &args.s3_endpoint {
        config.storage.endpoint_url = Some(endpoint.clone());
    }

    config.dry_run |= args.dry_run;
    config.validate()?;
    Ok(config)
}

/// Execute the requested action.
pub async fn execute(args: Cli) -> Result<Report> {
    let config = build_config(&args)?;
    let action = Action::from_cli(&args)?;

    if config.dry_run {
        info!("dry run: records are logged, not sent, and messages are not deleted");
    }

    let channel = DeliveryChannel::new(build_sink(&config.sink)?, &config.delivery, config.dry_run);
    let sources = if action.needs_object_store() {
        SourceResolver::new(Arc::new(S3ObjectStore::from_config(&config.storage).await))
    } else {
        SourceResolver::local_only()
    };
    let mut pipeline = Pipeline::new(RecordImporter::new(channel), sources);

    let summary = match action {
        Action::File(path) => pipeline.import_local_file(&path).await,
        Action::Folder(dir) => pipeline.import_local_folder(&dir).await,
        Action::S3File { bucket, key } => pipeline.import_remote_object(&bucket, &key).await,
        Action::S3Folder { bucket, prefix } => {
            pipeline.import_remote_prefix(&bucket, &prefix).await
        }
        Action::Sqs => return poll_queue(&args, &config, pipeline).await,
    };

    pipeline.close().await;
    Ok(Report::Import(summary?))
}

async fn poll_queue(args: &Cli, config: &Config, pipeline: Pipeline) -> Result<Report> {
    let queue = SqsQueue::connect(&config.queue).await?;
    let consumer = QueueConsumer::new(Arc::new(queue), pipeline, config.dry_run);

    let messages = (args.sqs_number_of_messages > 0).then_some(args.sqs_number_of_messages);
    let mode = PollMode::from_config(&config.queue, messages);

    let stop = CancellationToken::new();
    tokio::spawn(cancel_on_signal(stop.clone()));

    let mut poll = PollLoop::new(consumer, mode, config.queue.batch_size).with_stop_token(stop.clone());
    let result = poll.run().await;
    stop.cancel();

    Ok(Report::Poll(result?))
}
