//! Newline-delimited JSON over TCP

use super::Sink;
use crate::error::DeliveryError;
use crate::types::Record;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

/// Streams each record as one JSON line over a persistent TCP connection
///
/// The endpoint is expected to be a line-oriented JSON input (such as logstash's `tcp`
/// input with the `json_lines` codec). No application-level acknowledgment is read.
pub struct StreamSink {
    address: String,
    stream: Option<TcpStream>,
}

impl StreamSink {
    /// Create a sink for `host:port`; nothing is connected until [`Sink::connect`]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            stream: None,
        }
    }
}

#[async_trait]
impl Sink for StreamSink {
    async fn connect(&mut self) -> Result<(), DeliveryError> {
        let stream =
            TcpStream::connect(&self.address)
                .await
                .map_err(|source| DeliveryError::Connect {
                    address: self.address.clone(),
                    source,
                })?;
        stream.set_nodelay(true).ok();

        debug!(address = %self.address, "connected to stream sink");
        self.stream = Some(stream);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, record: &Record) -> Result<(), DeliveryError> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            DeliveryError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "stream sink is not connected",
            ))
        })?;

        let mut line =
            serde_json::to_vec(record).map_err(|e| DeliveryError::InvalidRecord(e.to_string()))?;
        line.push(b'\n');

        stream.write_all(&line).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // Best effort: the peer may already be gone
            let _ = stream.shutdown().await;
            debug!(address = %self.address, "disconnected from stream sink");
        }
    }

    fn name(&self) -> &'static str {
        "stream"
    }

    fn address(&self) -> &str {
        &self.address
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::record;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn sends_one_json_line_per_record() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let reader = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
            }
            received
        });

        let mut sink = StreamSink::new(address);
        sink.connect().await.unwrap();
        assert!(sink.is_connected());

        sink.send(&record(json!({"eventID": "1", "eventName": "ConsoleLogin"})))
            .await
            .unwrap();
        sink.send(&record(json!({"eventID": "2"}))).await.unwrap();
        sink.disconnect().await;
        assert!(!sink.is_connected());

        let lines = reader.await.unwrap();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["eventName"], "ConsoleLogin");
        let second: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second["eventID"], "2");
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_a_connect_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut sink = StreamSink::new(address.clone());
        match sink.connect().await {
            Err(DeliveryError::Connect { address: a, .. }) => assert_eq!(a, address),
            other => panic!("expected Connect error, got {:?}", other),
        }
        assert!(!sink.is_connected());
    }

    #[tokio::test]
    async fn send_without_connection_is_an_io_error() {
        let mut sink = StreamSink::new("127.0.0.1:1");
        let err = sink.send(&record(json!({}))).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Io(_)));
    }
}
