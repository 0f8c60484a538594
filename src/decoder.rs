//! Batch decoding: gzip-compressed JSON into an ordered list of records

use crate::error::DecodeError;
use crate::types::Record;
use flate2::read::GzDecoder;
use serde_json::Value;
use std::io::Read;
use tracing::{debug, warn};

/// Field holding the events of a batch
const RECORDS_FIELD: &str = "Records";

/// Decodes raw batch payloads
///
/// A batch is a gzip-compressed JSON document of the form `{"Records": [...]}`.
/// Payloads without a `Records` field (digest files, for instance) decode to an empty
/// batch and are logged in full so an operator can see what was skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchDecoder;

impl BatchDecoder {
    /// Decompress and parse a batch, preserving record order
    ///
    /// # Errors
    /// Returns [`DecodeError`] when the payload is not gzip, not JSON, or has a
    /// `Records` field that is not an array of objects. A corrupt batch is never
    /// partially decoded.
    pub fn decode(&self, raw: &[u8]) -> Result<Vec<Record>, DecodeError> {
        let mut json = Vec::new();
        GzDecoder::new(raw)
            .read_to_end(&mut json)
            .map_err(DecodeError::Decompress)?;

        let document: Value = serde_json::from_slice(&json).map_err(DecodeError::Json)?;
        self.records(document)
    }

    fn records(&self, document: Value) -> Result<Vec<Record>, DecodeError> {
        let mut document = match document {
            Value::Object(map) => map,
            other => {
                warn!(payload = %other, "batch is not a JSON object, nothing to import");
                return Ok(Vec::new());
            }
        };

        let Some(records) = document.remove(RECORDS_FIELD) else {
            let payload = Value::Object(document);
            warn!(
                payload = %payload,
                "batch has no Records field, nothing to import"
            );
            return Ok(Vec::new());
        };

        let items = match records {
            Value::Array(items) => items,
            other => {
                return Err(DecodeError::InvalidRecords(format!(
                    "expected an array, found {}",
                    json_type(&other)
                )));
            }
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(DecodeError::InvalidRecords(format!(
                    "record {} is {}, expected an object",
                    index,
                    json_type(&other)
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(records = records.len(), "decoded batch");
        Ok(records)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::gzip;
    use serde_json::json;

    #[test]
    fn decodes_records_in_order() {
        let raw = gzip(&json!({
            "Records": [
                {"eventID": "1", "eventName": "ConsoleLogin"},
                {"eventID": "2", "eventName": "AssumeRole"},
                {"eventID": "3", "eventName": "GetObject"},
            ]
        }));

        let records = BatchDecoder.decode(&raw).unwrap();

        let ids: Vec<_> = records.iter().map(|r| r["eventID"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn missing_records_field_is_an_empty_batch() {
        let raw = gzip(&json!({
            "awsAccountId": "123456789012",
            "digestStartTime": "2014-08-17T14:01:20Z"
        }));

        let records = BatchDecoder.decode(&raw).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn non_object_document_is_an_empty_batch() {
        let raw = gzip(&json!([{"eventID": "1"}]));
        assert!(BatchDecoder.decode(&raw).unwrap().is_empty());
    }

    #[test]
    fn empty_records_array_is_an_empty_batch() {
        let raw = gzip(&json!({ "Records": [] }));
        assert!(BatchDecoder.decode(&raw).unwrap().is_empty());
    }

    #[test]
    fn uncompressed_payload_is_a_decompress_error() {
        let raw = br#"{"Records": []}"#;
        assert!(matches!(
            BatchDecoder.decode(raw),
            Err(DecodeError::Decompress(_))
        ));
    }

    #[test]
    fn truncated_gzip_is_a_decompress_error() {
        let raw = gzip(&json!({ "Records": [{"eventID": "1"}] }));
        let truncated = &raw[..raw.len() / 2];
        assert!(matches!(
            BatchDecoder.decode(truncated),
            Err(DecodeError::Decompress(_))
        ));
    }

    #[test]
    fn invalid_json_is_a_json_error() {
        let raw = crate::test_helpers::gzip_bytes(b"{\"Records\": [");
        assert!(matches!(BatchDecoder.decode(&raw), Err(DecodeError::Json(_))));
    }

    #[test]
    fn non_array_records_is_rejected() {
        let raw = gzip(&json!({ "Records": {"eventID": "1"} }));
        match BatchDecoder.decode(&raw) {
            Err(DecodeError::InvalidRecords(reason)) => {
                assert!(reason.contains("an object"), "got: {reason}");
            }
            other => panic!("expected InvalidRecords, got {:?}", other),
        }
    }

    #[test]
    fn non_object_record_is_rejected() {
        let raw = gzip(&json!({ "Records": [{"eventID": "1"}, "oops"] }));
        match BatchDecoder.decode(&raw) {
            Err(DecodeError::InvalidRecords(reason)) => {
                assert!(reason.contains("record 1"), "got: {reason}");
            }
            other => panic!("expected InvalidRecords, got {:?}", other),
        }
    }
}
