//! HTTP indexed-store sink (Elasticsearch-style REST API)

use super::Sink;
use crate::error::{DeliveryError, Error, Result, TransformError};
use crate::transform::{INDEX_FIELD, annotate_for_index};
use crate::types::Record;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Field used as the document type
const TYPE_FIELD: &str = "eventName";

/// Posts each record to `/{index}/{eventName}` on an HTTP indexed store
///
/// Records are annotated by [`annotate_for_index`] in [`Sink::prepare`], which sets the
/// `@index` field used for routing. Records without an `eventName` cannot be routed
/// and are refused there too, so the importer skips them.
///
/// The first time an index is seen (and again after every [`Sink::checkpoint`]) it is
/// checked with `GET /{index}` and created with the configured mapping unless that
/// returns 200.
pub struct IndexSink {
    base_url: Url,
    address: String,
    index_prefix: String,
    mapping: String,
    request_timeout: Duration,
    client: Option<reqwest::Client>,
    known_indices: HashSet<String>,
}

impl IndexSink {
    /// Create a sink for `host:port`
    ///
    /// # Errors
    /// Returns a configuration error if the address does not form a valid URL.
    pub fn new(
        address: &str,
        index_prefix: String,
        mapping: String,
        request_timeout: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(&format!("http://{}/", address))
            .map_err(|e| Error::config("sink.address", format!("invalid address: {}", e)))?;

        Ok(Self {
            base_url,
            address: address.to_string(),
            index_prefix,
            mapping,
            request_timeout,
            client: None,
            known_indices: HashSet::new(),
        })
    }

    fn url(&self, segments: &[&str]) -> std::result::Result<Url, DeliveryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DeliveryError::InvalidRecord(format!("cannot build URL on {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn ensure_index(
        &self,
        client: &reqwest::Client,
        index: &str,
    ) -> std::result::Result<(), DeliveryError> {
        let url = self.url(&[index])?;

        let existing = client.get(url.clone()).send().await?;
        if existing.status().as_u16() == 200 {
            return Ok(());
        }

        info!(index = %index, "creating index");
        let created = client
            .put(url)
            .header(CONTENT_TYPE, "application/json")
            .body(self.mapping.clone())
            .send()
            .await?;

        let status = created.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: created.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

fn required_str<'a>(
    record: &'a Record,
    field: &str,
) -> std::result::Result<&'a str, DeliveryError> {
    record
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| DeliveryError::InvalidRecord(format!("missing {} field", field)))
}

#[async_trait]
impl Sink for IndexSink {
    fn prepare(&self, record: &mut Record) -> std::result::Result<(), TransformError> {
        if !record.get(TYPE_FIELD).is_some_and(Value::is_string) {
            return Err(TransformError::MissingField(TYPE_FIELD));
        }
        annotate_for_index(record, &self.index_prefix)
    }

    async fn connect(&mut self) -> std::result::Result<(), DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?;
        debug!(address = %self.address, "created index sink client");
        self.client = Some(client);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    async fn send(&mut self, record: &Record) -> std::result::Result<(), DeliveryError> {
        let index = required_str(record, INDEX_FIELD)?;
        let doc_type = required_str(record, TYPE_FIELD)?;
        let client = self.client.clone().ok_or_else(|| {
            DeliveryError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "index sink is not connected",
            ))
        })?;

        if !self.known_indices.contains(index) {
            self.ensure_index(&client, index).await?;
            self.known_indices.insert(index.to_string());
        }

        let response = client
            .post(self.url(&[index, doc_type])?)
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.client = None;
    }

    async fn checkpoint(&mut self) {
        // Indices may have been deleted or rolled over since they were checked
        self.known_indices.clear();
    }

    fn name(&self) -> &'static str {
        "index"
    }

    fn address(&self) -> &str {
        &self.address
    }
}
