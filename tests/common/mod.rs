//! Common test utilities for cloudtrail-relay integration tests

use cloudtrail_relay::{DeliveryChannel, DeliveryConfig, RetryConfig, StreamSink};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Gzip-compressed batch with one record per event id
pub fn batch(ids: &[&str]) -> Vec<u8> {
    let records: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "eventVersion": "1.02",
                "eventID": id,
                "eventTime": "2014-08-17T14:01:20Z",
                "eventName": "ConsoleLogin",
                "userIdentity": {"type": "Root", "accountId": "123456789012"}
            })
        })
        .collect();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&serde_json::to_vec(&json!({ "Records": records })).unwrap())
        .unwrap();
    encoder.finish().unwrap()
}

/// Loopback line collector standing in for a logstash `json_lines` input
///
/// Accepts a single connection and returns every line received once it closes.
pub async fn line_collector() -> (String, JoinHandle<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(socket).lines();
        let mut received = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            received.push(serde_json::from_str(&line).unwrap());
        }
        received
    });

    (address, handle)
}

/// Stream-sink channel with millisecond retries
pub fn stream_channel(address: &str) -> DeliveryChannel {
    let config = DeliveryConfig {
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(5),
            ..Default::default()
        },
        ..Default::default()
    };
    DeliveryChannel::new(Box::new(StreamSink::new(address)), &config, false)
}

/// `eventID` of each received line
pub fn event_ids(lines: &[Value]) -> Vec<&str> {
    lines
        .iter()
        .map(|line| line["eventID"].as_str().unwrap())
        .collect()
}
