//! Raw log records as exported by the upstream search platform
//!
//! A record looks like `{ "result": { "_raw": "...", "_time": "...", "fields.X": ["v"] } }`.
//! Promoted columns usually arrive as single-element arrays, sometimes as
//! bare strings, and are often absent.

use crate::repair;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column holding the distributed trace id
pub const TRACE_ID_COLUMN: &str = "fields.x-b3-traceid";
/// Column holding the calling application name
pub const CLIENT_APP_COLUMN: &str = "fields.ClientAppName";
/// Column holding the HTTP-style status code
pub const STATUS_CODE_COLUMN: &str = "fields.StatusCode";
/// Column holding the account id
pub const ACCOUNT_ID_COLUMN: &str = "fields.accountId";
/// Column holding the correlation id
pub const CORRELATION_ID_COLUMN: &str = "fields.correlationId";
/// Column holding the event name
pub const EVENT_COLUMN: &str = "event";

/// One record from the upstream log query layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub result: Map<String, Value>,
}

impl RawRecord {
    /// Wrap an already-built `result` map
    pub fn new(result: Map<String, Value>) -> Self {
        Self { result }
    }

    /// Build a record from an arbitrary JSON value
    ///
    /// Values that are not objects, or objects without an object `result`,
    /// yield an empty record rather than an error.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut obj) => match obj.remove("result") {
                Some(Value::Object(result)) => Self { result },
                _ => Self::default(),
            },
            _ => Self::default(),
        }
    }

    /// First non-empty string of a promoted column
    ///
    /// Handles both `["value"]` and `"value"` shapes. Numbers are rendered
    /// as strings so `[500]` and `["500"]` read the same.
    pub fn column(&self, name: &str) -> Option<&str> {
        let value = match self.result.get(name)? {
            Value::Array(items) => items.first()?,
            other => other,
        };
        match value {
            Value::String(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric column value, if the column holds a JSON number
    pub fn column_number(&self, name: &str) -> Option<&serde_json::Number> {
        let value = match self.result.get(name)? {
            Value::Array(items) => items.first()?,
            other => other,
        };
        match value {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// `_time` as exported, without interpretation
    pub fn time(&self) -> Option<&str> {
        match self.result.get("_time")? {
            Value::String(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Repaired `_raw` payload, if present and recoverable
    pub fn raw_payload(&self) -> Option<Value> {
        let raw = self.result.get("_raw")?;
        let fixed = repair::fix_value(raw);
        if fixed.is_none() {
            tracing::debug!("Unrecoverable _raw payload, treating its fields as absent");
        }
        fixed.map(|v| v.into_owned())
    }
}

impl From<Value> for RawRecord {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_shapes() {
        let record = RawRecord::from_value(json!({
            "result": {
                "fields.ClientAppName": ["checkout"],
                "fields.StatusCode": "502",
                "event": [],
                "fields.x-b3-traceid": [""],
            }
        }));

        assert_eq!(record.column(CLIENT_APP_COLUMN), Some("checkout"));
        assert_eq!(record.column(STATUS_CODE_COLUMN), Some("502"));
        assert_eq!(record.column(EVENT_COLUMN), None);
        assert_eq!(record.column(TRACE_ID_COLUMN), None);
        assert_eq!(record.column("missing"), None);
    }

    #[test]
    fn test_column_number() {
        let record = RawRecord::from_value(json!({"result": {"fields.StatusCode": [404]}}));
        assert_eq!(record.column(STATUS_CODE_COLUMN), None);
        assert_eq!(
            record.column_number(STATUS_CODE_COLUMN).and_then(|n| n.as_i64()),
            Some(404)
        );
    }

    #[test]
    fn test_from_value_without_result() {
        assert_eq!(RawRecord::from_value(json!({"preview": false})), RawRecord::default());
        assert_eq!(RawRecord::from_value(json!("text")), RawRecord::default());
    }

    #[test]
    fn test_raw_payload_repaired() {
        let record = RawRecord::from_value(json!({
            "result": {"_raw": "{\"fields\":{\"event\":\"a\u{7}b\"}}"}
        }));
        assert_eq!(record.raw_payload(), Some(json!({"fields": {"event": "ab"}})));
    }

    #[test]
    fn test_raw_payload_object_passthrough() {
        let record = RawRecord::from_value(json!({"result": {"_raw": {"event": "x"}}}));
        assert_eq!(record.raw_payload(), Some(json!({"event": "x"})));
    }

    #[test]
    fn test_deserialize_defaults() {
        let record: RawRecord = serde_json::from_str(r#"{"preview":false}"#).unwrap();
        assert!(record.result.is_empty());
        assert_eq!(record.time(), None);
    }
}
