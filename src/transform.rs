//! Record annotation for the indexed-store sink
//!
//! CloudTrail records carry their time as `eventTime` (`2014-08-17T14:01:20Z`).
//! Before indexing, each record gets:
//! - `@timestamp` in the millisecond form the search UI expects
//! - `@index`, a monthly per-account index name
//!
//! and loses `eventTime`.

use crate::error::TransformError;
use crate::types::Record;
use chrono::NaiveDateTime;
use serde_json::Value;

/// Field the record's event time is read from (and removed)
pub const EVENT_TIME_FIELD: &str = "eventTime";
/// Field the normalized timestamp is written to
pub const TIMESTAMP_FIELD: &str = "@timestamp";
/// Field the target index is written to
pub const INDEX_FIELD: &str = "@index";

const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

/// Annotate a record with `@timestamp` and `@index`
///
/// The record is only modified when every step succeeds.
///
/// # Errors
/// Returns [`TransformError`] if `eventTime` or `userIdentity.accountId` is missing,
/// or if `eventTime` does not match `%Y-%m-%dT%H:%M:%SZ`.
pub fn annotate_for_index(record: &mut Record, index_prefix: &str) -> Result<(), TransformError> {
    let event_time = record
        .get(EVENT_TIME_FIELD)
        .and_then(Value::as_str)
        .ok_or(TransformError::MissingField(EVENT_TIME_FIELD))?;

    let timestamp = NaiveDateTime::parse_from_str(event_time, EVENT_TIME_FORMAT).map_err(|e| {
        TransformError::InvalidTimestamp {
            value: event_time.to_string(),
            source: e,
        }
    })?;

    let account_id = record
        .get("userIdentity")
        .and_then(|identity| identity.get("accountId"))
        .and_then(Value::as_str)
        .ok_or(TransformError::MissingField("userIdentity.accountId"))?;

    let index = index_name(index_prefix, account_id, &timestamp);

    record.insert(
        TIMESTAMP_FIELD.to_string(),
        Value::String(timestamp.format(TIMESTAMP_FORMAT).to_string()),
    );
    record.remove(EVENT_TIME_FIELD);
    record.insert(INDEX_FIELD.to_string(), Value::String(index));
    Ok(())
}

/// Monthly per-account index name, e.g. `cloudtrail-123456789012-2014-08`
pub fn index_name(prefix: &str, account_id: &str, timestamp: &NaiveDateTime) -> String {
    format!("{}-{}-{}", prefix, account_id, timestamp.format("%Y-%m"))
}
