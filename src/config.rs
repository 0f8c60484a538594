//! Configuration types for cloudtrail-relay

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Index mapping applied to newly created indices
///
/// Forces every string field to be stored un-analyzed so that ARNs, user agents and
/// IP addresses can be aggregated verbatim.
pub const DEFAULT_INDEX_MAPPING: &str = r#"{ "mappings": { "_default_": { "dynamic_templates": [ { "string_template": { "match": "*", "match_mapping_type": "string", "mapping": { "type": "string", "index": "not_analyzed" } } } ] } } }"#;

/// Main configuration for the relay
///
/// Every field has a default, so an empty JSON object is a valid configuration:
/// stream records to `127.0.0.1:10000` and read from the `cloudtrail` queue in
/// `us-east-1`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where records are delivered
    #[serde(default)]
    pub sink: SinkConfig,

    /// Delivery retry and progress settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Notification queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Object storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Pretend to perform actions: no delivery and no message deletion
    #[serde(default)]
    pub dry_run: bool,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })
    }

    /// Check that all settings are usable
    pub fn validate(&self) -> Result<()> {
        validate_address("sink.address", self.sink.address())?;

        if self.delivery.retry.max_attempts == 0 {
            return Err(Error::config(
                "delivery.retry.max_attempts",
                "at least one delivery attempt is required",
            ));
        }
        if self.delivery.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "delivery.retry.backoff_multiplier",
                "backoff multiplier must be >= 1.0",
            ));
        }
        if self.delivery.progress_interval == 0 {
            return Err(Error::config(
                "delivery.progress_interval",
                "progress interval must be positive",
            ));
        }
        if !(1..=10).contains(&self.queue.batch_size) {
            return Err(Error::config(
                "queue.batch_size",
                "batch size must be between 1 and 10",
            ));
        }
        if !(0..=20).contains(&self.queue.wait_time_seconds) {
            return Err(Error::config(
                "queue.wait_time_seconds",
                "wait time must be between 0 and 20 seconds",
            ));
        }
        if self.queue.name.is_empty() {
            return Err(Error::config("queue.name", "queue name must not be empty"));
        }

        Ok(())
    }
}

fn validate_address(key: &str, address: &str) -> Result<()> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| Error::config(key, format!("expected host:port, got {address:?}")))?;
    if host.is_empty() {
        return Err(Error::config(key, format!("missing host in {address:?}")));
    }
    port.parse::<u16>()
        .map_err(|_| Error::config(key, format!("invalid port in {address:?}")))?;
    Ok(())
}

/// Sink selection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// TCP endpoint accepting newline-delimited JSON (e.g. a logstash `json_lines` input)
    Stream {
        /// host:port of the endpoint (default: "127.0.0.1:10000")
        #[serde(default = "default_stream_address")]
        address: String,
    },
    /// HTTP indexed store (e.g. Elasticsearch)
    Index {
        /// host:port of the HTTP endpoint (default: "127.0.0.1:9200")
        #[serde(default = "default_index_address")]
        address: String,

        /// Prefix of the monthly per-account index names (default: "cloudtrail")
        #[serde(default = "default_index_prefix")]
        index_prefix: String,

        /// Body sent when creating a missing index
        #[serde(default = "default_index_mapping")]
        mapping: String,

        /// Per-request timeout (default: 30 seconds)
        #[serde(default = "default_request_timeout", with = "duration_serde")]
        request_timeout: Duration,
    },
}

impl SinkConfig {
    /// Default indexed-store sink
    pub fn index(address: impl Into<String>) -> Self {
        SinkConfig::Index {
            address: address.into(),
            index_prefix: default_index_prefix(),
            mapping: default_index_mapping(),
            request_timeout: default_request_timeout(),
        }
    }

    /// Indexed-store sink on its default address
    pub fn default_index() -> Self {
        Self::index(default_index_address())
    }

    /// The configured host:port
    pub fn address(&self) -> &str {
        match self {
            SinkConfig::Stream { address } | SinkConfig::Index { address, .. } => address,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Stream {
            address: default_stream_address(),
        }
    }
}

/// Delivery settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Send retry schedule
    #[serde(default)]
    pub retry: RetryConfig,

    /// Log progress (and re-check indices) every N delivered records (default: 1000)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            progress_interval: default_progress_interval(),
        }
    }
}

/// Retry behavior configuration
///
/// The defaults give a fixed schedule: 10 attempts, 10 seconds apart.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of send attempts per record, including the first (default: 10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 10 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 10 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 1.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_retry_delay(),
            max_delay: default_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Notification queue configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name (default: "cloudtrail")
    #[serde(default = "default_queue_name")]
    pub name: String,

    /// Region the queue lives in (default: "us-east-1")
    #[serde(default = "default_region")]
    pub region: String,

    /// Messages requested per receive call, 1-10 (default: 10)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Long-poll wait per receive call, 0-20 seconds (default: 0)
    #[serde(default)]
    pub wait_time_seconds: i32,

    /// Pause between drain cycles; None drains once and exits
    #[serde(default, with = "optional_duration_serde")]
    pub poll_interval: Option<Duration>,

    /// Custom queue endpoint (for local emulators)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            region: default_region(),
            batch_size: default_batch_size(),
            wait_time_seconds: 0,
            poll_interval: None,
            endpoint_url: None,
        }
    }
}

/// Object storage configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Region override (default: provider chain)
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint (for local emulators)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_stream_address() -> String {
    "127.0.0.1:10000".to_string()
}

fn default_index_address() -> String {
    "127.0.0.1:9200".to_string()
}

fn default_index_prefix() -> String {
    "cloudtrail".to_string()
}

fn default_index_mapping() -> String {
    DEFAULT_INDEX_MAPPING.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_progress_interval() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_queue_name() -> String {
    "cloudtrail".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_batch_size() -> usize {
    10
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
