//! Shared fixtures and in-memory collaborators for unit tests

use crate::config::{DeliveryConfig, RetryConfig};
use crate::error::{DeliveryError, FetchError, QueueError, TransformError};
use crate::queue::{NotificationQueue, QueueMessage, VALIDATION_MESSAGE};
use crate::sink::Sink;
use crate::source::{ObjectStore, S3ObjectStore};
use crate::types::Record;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Gzip raw bytes
pub(crate) fn gzip_bytes(raw: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw).unwrap();
    encoder.finish().unwrap()
}

/// Gzip a JSON document
pub(crate) fn gzip(document: &Value) -> Vec<u8> {
    gzip_bytes(&serde_json::to_vec(document).unwrap())
}

/// Unwrap a JSON object literal into a record
pub(crate) fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other}"),
    }
}

/// A compressed batch with one annotatable record per id
pub(crate) fn batch(ids: &[&str]) -> Vec<u8> {
    let records: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "eventID": id,
                "eventName": "ConsoleLogin",
                "eventTime": "2014-08-17T14:01:20Z",
                "userIdentity": {"accountId": "123456789012"}
            })
        })
        .collect();
    gzip(&json!({ "Records": records }))
}

/// Delivery settings with millisecond retry delays
pub(crate) fn fast_retry(max_attempts: u32) -> DeliveryConfig {
    DeliveryConfig {
        retry: RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            jitter: false,
        },
        progress_interval: 1000,
    }
}

/// SNS envelope pointing at `keys` in `bucket`
pub(crate) fn pointer_body(bucket: &str, keys: &[&str]) -> String {
    let message = json!({"s3Bucket": bucket, "s3ObjectKey": keys}).to_string();
    json!({"Type": "Notification", "Message": message}).to_string()
}

/// SNS envelope carrying the CloudTrail validation ping
pub(crate) fn ping_body() -> String {
    json!({"Type": "Notification", "Message": VALIDATION_MESSAGE}).to_string()
}

/// Unconfirmed-subscription envelope
pub(crate) fn confirmation_body() -> String {
    json!({
        "Type": "SubscriptionConfirmation",
        "Message": "You have chosen to subscribe to the topic"
    })
    .to_string()
}

/// S3 store pointed at a closed local port, with SDK retries disabled
pub(crate) fn unreachable_s3_store() -> S3ObjectStore {
    use aws_sdk_s3::config::retry::RetryConfig as SdkRetryConfig;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "static"))
        .endpoint_url("http://127.0.0.1:1")
        .force_path_style(true)
        .retry_config(SdkRetryConfig::disabled())
        .build();
    S3ObjectStore::new(aws_sdk_s3::Client::from_conf(config))
}

/// Everything a [`RecordingSink`] observed
#[derive(Debug, Default)]
pub(crate) struct SinkLog {
    pub connect_attempts: u32,
    pub connects: u32,
    pub disconnects: u32,
    pub attempts: u32,
    pub checkpoints: u32,
    pub records: Vec<Record>,
}

impl SinkLog {
    /// `eventID` of every delivered record, in order
    pub fn delivered_ids(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| {
                r.get("eventID")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }
}

/// Sink that records deliveries and fails on a script
pub(crate) struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    connected: bool,
    send_failures: u32,
    connect_failures: u32,
    poisoned: HashSet<String>,
    rejected: HashSet<String>,
    required_field: Option<&'static str>,
}

impl RecordingSink {
    pub fn new() -> (Self, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        let sink = Self {
            log: log.clone(),
            connected: false,
            send_failures: 0,
            connect_failures: 0,
            poisoned: HashSet::new(),
            rejected: HashSet::new(),
            required_field: None,
        };
        (sink, log)
    }

    /// The next `n` sends fail with a retryable socket error
    pub fn failing_sends(mut self, n: u32) -> Self {
        self.send_failures = n;
        self
    }

    /// The next `n` connects fail
    pub fn failing_connects(mut self, n: u32) -> Self {
        self.connect_failures = n;
        self
    }

    /// Sends of the record with this `eventID` always fail (retryable)
    pub fn poisoned(mut self, event_id: &str) -> Self {
        self.poisoned.insert(event_id.to_string());
        self
    }

    /// The record with this `eventID` is refused (not retryable)
    pub fn rejecting(mut self, event_id: &str) -> Self {
        self.rejected.insert(event_id.to_string());
        self
    }

    /// `prepare` fails for records lacking `field`
    pub fn requiring(mut self, field: &'static str) -> Self {
        self.required_field = Some(field);
        self
    }
}

fn broken_pipe() -> DeliveryError {
    DeliveryError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "broken pipe",
    ))
}

#[async_trait]
impl Sink for RecordingSink {
    fn prepare(&self, record: &mut Record) -> Result<(), TransformError> {
        match self.required_field {
            Some(field) if !record.contains_key(field) => Err(TransformError::MissingField(field)),
            _ => Ok(()),
        }
    }

    async fn connect(&mut self) -> Result<(), DeliveryError> {
        let mut log = self.log.lock().unwrap();
        log.connect_attempts += 1;
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(DeliveryError::Connect {
                address: "memory".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ),
            });
        }
        log.connects += 1;
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, record: &Record) -> Result<(), DeliveryError> {
        let mut log = self.log.lock().unwrap();
        log.attempts += 1;

        let id = record
            .get("eventID")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if self.rejected.contains(id) {
            return Err(DeliveryError::Rejected {
                status: 400,
                body: "rejected".to_string(),
            });
        }
        if self.poisoned.contains(id) {
            return Err(broken_pipe());
        }
        if self.send_failures > 0 {
            self.send_failures -= 1;
            return Err(broken_pipe());
        }

        log.records.push(record.clone());
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.log.lock().unwrap().disconnects += 1;
        }
    }

    async fn checkpoint(&mut self) {
        self.log.lock().unwrap().checkpoints += 1;
    }

    fn name(&self) -> &'static str {
        "recording"
    }

    fn address(&self) -> &str {
        "memory"
    }
}

#[derive(Debug, Default)]
struct QueueState {
    visible: VecDeque<QueueMessage>,
    deleted: Vec<String>,
    released: Vec<String>,
    receive_calls: usize,
    fail_deletes: bool,
    fail_receives: bool,
}

/// In-memory queue; received messages stay invisible until released
#[derive(Clone, Default)]
pub(crate) struct MemoryQueue {
    state: Arc<Mutex<QueueState>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message_id: &str, body: String) {
        self.state.lock().unwrap().visible.push_back(QueueMessage {
            message_id: message_id.to_string(),
            receipt_handle: format!("receipt-{message_id}"),
            body,
        });
    }

    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().fail_deletes = true;
    }

    pub fn fail_receives(&self) {
        self.state.lock().unwrap().fail_receives = true;
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn released(&self) -> Vec<String> {
        self.state.lock().unwrap().released.clone()
    }

    pub fn visible(&self) -> usize {
        self.state.lock().unwrap().visible.len()
    }

    pub fn receive_calls(&self) -> usize {
        self.state.lock().unwrap().receive_calls
    }
}

#[async_trait]
impl NotificationQueue for MemoryQueue {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let mut state = self.state.lock().unwrap();
        state.receive_calls += 1;
        if state.fail_receives {
            return Err(QueueError::Receive("scripted failure".to_string()));
        }
        let count = max.min(state.visible.len());
        Ok(state.visible.drain(..count).collect())
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            return Err(QueueError::Delete {
                message_id: message.message_id.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        state.deleted.push(message.message_id.clone());
        Ok(())
    }

    async fn release(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state.released.push(message.message_id.clone());
        state.visible.push_back(message.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<(String, String), Vec<u8>>,
    fetched: Vec<String>,
}

/// In-memory object store with S3-like single-level listing
#[derive(Clone, Default)]
pub(crate) struct MemoryObjectStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert((bucket.to_string(), key.to_string()), data);
    }

    /// Keys requested through `get_object`, in order
    pub fn fetched(&self) -> Vec<String> {
        self.state.lock().unwrap().fetched.clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError> {
        let mut state = self.state.lock().unwrap();
        state.fetched.push(key.to_string());
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, FetchError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .keys()
            .filter(|(b, key)| {
                b == bucket
                    && key
                        .strip_prefix(prefix)
                        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(_, key)| key.clone())
            .collect())
    }
}
