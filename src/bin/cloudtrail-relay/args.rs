//! CLI argument definitions for cloudtrail-relay.

use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;

/// Import AWS CloudTrail logs into a log sink.
///
/// Exactly one import action is required.
///
/// ## Examples
///
/// Drain the notification queue once:
///   cloudtrail-relay --import-sqs cloudtrail --sqs-region eu-west-1
///
/// Keep polling every five minutes, into an indexed store:
///   cloudtrail-relay --import-sqs cloudtrail --sqs-poll-interval 300 \
///       --sink index --sink-address es.internal:9200
///
/// Backfill a day from the trail bucket:
///   cloudtrail-relay --s3-bucket trail --import-s3-folder AWSLogs/123456789012/CloudTrail/us-east-1/2014/08/17/
#[derive(Parser, Debug)]
#[command(name = "cloudtrail-relay")]
#[command(version, about, long_about = None)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["import_file", "import_folder", "import_s3_file", "import_s3_folder", "import_sqs"])
))]
pub struct Cli {
    // === Actions ===
    /// Import a single local batch file
    #[arg(long, value_name = "PATH")]
    pub import_file: Option<PathBuf>,

    /// Import every .json.gz file under a local folder, recursively
    #[arg(long, value_name = "DIR")]
    pub import_folder: Option<PathBuf>,

    /// Import a single object from --s3-bucket
    #[arg(long, value_name = "KEY", requires = "s3_bucket")]
    pub import_s3_file: Option<String>,

    /// Import every object directly under a prefix of --s3-bucket
    #[arg(long, value_name = "PREFIX", requires = "s3_bucket")]
    pub import_s3_folder: Option<String>,

    /// Import the batches announced on a notification queue
    #[arg(long, value_name = "QUEUE")]
    pub import_sqs: Option<String>,

    // === Object storage ===
    /// Bucket for --import-s3-file and --import-s3-folder
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Object storage region (default: AWS provider chain)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Custom object storage endpoint (for LocalStack)
    #[arg(long, env = "CLOUDTRAIL_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    // === Queue ===
    /// Region of the notification queue [default: us-east-1]
    #[arg(long)]
    pub sqs_region: Option<String>,

    /// Number of messages to handle, then exit (0 = drain the queue)
    #[arg(long, default_value = "0")]
    pub sqs_number_of_messages: usize,

    /// Seconds to wait between drain cycles; without it the queue is drained once
    #[arg(long, value_name = "SECONDS")]
    pub sqs_poll_interval: Option<u64>,

    /// Custom queue endpoint (for LocalStack)
    #[arg(long, env = "CLOUDTRAIL_SQS_ENDPOINT")]
    pub sqs_endpoint: Option<String>,

    // === Sink ===
    /// Sink type [default: stream]
    #[arg(long, value_enum)]
    pub sink: Option<SinkKind>,

    /// Sink host:port [default: 127.0.0.1:10000 for stream, 127.0.0.1:9200 for index]
    #[arg(long, value_name = "HOST:PORT")]
    pub sink_address: Option<String>,

    // === General ===
    /// JSON configuration file; flags override its values
    #[arg(short, long, env = "CLOUDTRAIL_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pretend to perform actions: log records instead of sending them, keep messages
    #[arg(long)]
    pub dry_run: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

/// Sink type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// Newline-delimited JSON over TCP (logstash)
    Stream,
    /// HTTP indexed store (Elasticsearch)
    Index,
}

/// Log level argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}
