//! Canonical field extraction from raw records
//!
//! Every canonical field is resolved through an explicit, ordered list of
//! sources. The first source that yields a value wins; when none does, the
//! field falls back to a documented default. Extraction never fails.

mod latency;

pub use latency::{Clock, LatencyFallback, DEFAULT_LATENCY_RANGE};

use crate::record::{
    RawRecord, ACCOUNT_ID_COLUMN, CLIENT_APP_COLUMN, CORRELATION_ID_COLUMN, EVENT_COLUMN,
    STATUS_CODE_COLUMN, TRACE_ID_COLUMN,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder for records without a client application
pub const UNKNOWN_APP: &str = "Unknown App";
/// Placeholder for records without an event name
pub const NO_EVENT: &str = "—";
/// Status code assumed when none can be parsed
pub const DEFAULT_STATUS_CODE: i64 = 200;

const RECEIVED_TIME_FIELD: &str = "client.received.time";
const SENT_TIME_FIELD: &str = "client.sent.time";

/// Canonical view of one raw record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedFields {
    pub trace_id: Option<String>,
    pub client_app_name: String,
    pub status_code: i64,
    /// ISO-8601 timestamp as exported, or extraction time when absent
    pub timestamp: String,
    pub event: String,
    /// Milliseconds between receive and send, or a synthesized placeholder
    pub latency: i64,
    pub account_id: Option<String>,
    pub correlation_id: Option<String>,
    /// `fields` object of the repaired `_raw` payload
    pub raw_fields: Map<String, Value>,
}

/// Source of a candidate value: promoted columns first, repaired payload second
type Source = fn(&RawRecord, Option<&Value>) -> Option<String>;

const TRACE_ID_SOURCES: &[Source] = &[
    |record, _| column_text(record, TRACE_ID_COLUMN),
    |_, payload| payload_field(payload, "x-b3-traceid"),
];

const CLIENT_APP_SOURCES: &[Source] = &[
    |record, _| column_text(record, CLIENT_APP_COLUMN),
    |_, payload| payload_field(payload, "ClientAppName"),
];

const STATUS_CODE_SOURCES: &[Source] = &[
    |record, _| column_text(record, STATUS_CODE_COLUMN),
    |_, payload| payload_field(payload, "StatusCode"),
];

const EVENT_SOURCES: &[Source] = &[
    |record, _| column_text(record, EVENT_COLUMN),
    |_, payload| payload.and_then(|p| p.get("event")).and_then(value_text),
    |_, payload| payload_field(payload, "event"),
];

const ACCOUNT_ID_SOURCES: &[Source] = &[
    |record, _| column_text(record, ACCOUNT_ID_COLUMN),
    |_, payload| payload_field(payload, "accountId"),
];

const CORRELATION_ID_SOURCES: &[Source] = &[
    |record, _| column_text(record, CORRELATION_ID_COLUMN),
    |_, payload| payload_field(payload, "correlationId"),
];

fn first_of(sources: &[Source], record: &RawRecord, payload: Option<&Value>) -> Option<String> {
    sources.iter().find_map(|source| source(record, payload))
}

fn column_text(record: &RawRecord, column: &str) -> Option<String> {
    record
        .column(column)
        .map(str::to_string)
        .or_else(|| record.column_number(column).map(|n| n.to_string()))
}

fn payload_field(payload: Option<&Value>, key: &str) -> Option<String> {
    payload?.get("fields")?.get(key).and_then(value_text)
}

/// Non-empty string or number rendered as text
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Leading-integer parse: optional sign followed by digits, rest ignored
///
/// `"500"`, `" 404 "`, `"503 Service Unavailable"` and `"200.0"` all parse;
/// `"abc"` and `""` do not.
pub fn parse_status_code(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Parse the timestamp shapes seen in exports into UTC
///
/// Accepts RFC 3339, ISO-8601 with a `+hhmm` offset, and naive
/// `YYYY-MM-DD[T| ]HH:MM:SS[.fff]` interpreted as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Field extractor with injectable latency fallback and clock
#[derive(Debug, Default)]
pub struct FieldExtractor {
    latency: LatencyFallback,
    clock: Clock,
}

impl FieldExtractor {
    /// Create extractor with explicit latency fallback and clock
    pub fn new(latency: LatencyFallback, clock: Clock) -> Self {
        Self { latency, clock }
    }

    /// Extractor whose fallbacks are fully deterministic
    pub fn deterministic(latency_ms: i64, now: DateTime<Utc>) -> Self {
        Self::new(LatencyFallback::fixed(latency_ms), Clock::Fixed(now))
    }

    /// Resolve only the trace id of a record
    pub fn trace_id(&self, record: &RawRecord) -> Option<String> {
        // Avoid repairing `_raw` when the promoted column already answers
        if let Some(id) = column_text(record, TRACE_ID_COLUMN) {
            return Some(id);
        }
        let payload = record.raw_payload();
        first_of(TRACE_ID_SOURCES, record, payload.as_ref())
    }

    /// Extract all canonical fields of a record
    pub fn extract(&self, record: &RawRecord) -> NormalizedFields {
        let payload = record.raw_payload();
        let payload = payload.as_ref();

        let trace_id = first_of(TRACE_ID_SOURCES, record, payload);
        if trace_id.is_none() {
            tracing::debug!("Record has no resolvable trace id");
        }

        let client_app_name = first_of(CLIENT_APP_SOURCES, record, payload)
            .unwrap_or_else(|| UNKNOWN_APP.to_string());

        // The first present source decides; an unparseable one does not fall through
        let status_code = first_of(STATUS_CODE_SOURCES, record, payload)
            .and_then(|text| parse_status_code(&text))
            .unwrap_or(DEFAULT_STATUS_CODE);

        let timestamp = record
            .time()
            .map(str::to_string)
            .unwrap_or_else(|| self.clock.now_iso());

        let event =
            first_of(EVENT_SOURCES, record, payload).unwrap_or_else(|| NO_EVENT.to_string());

        let raw_fields = payload
            .and_then(|p| p.get("fields"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let latency = measured_latency(&raw_fields).unwrap_or_else(|| self.latency.synthesize());

        NormalizedFields {
            trace_id,
            client_app_name,
            status_code,
            timestamp,
            event,
            latency,
            account_id: first_of(ACCOUNT_ID_SOURCES, record, payload),
            correlation_id: first_of(CORRELATION_ID_SOURCES, record, payload),
            raw_fields,
        }
    }

    /// Current time according to the extractor's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

fn measured_latency(fields: &Map<String, Value>) -> Option<i64> {
    let received = fields.get(RECEIVED_TIME_FIELD).and_then(value_number)?;
    let sent = fields.get(SENT_TIME_FIELD).and_then(value_number)?;
    Some((sent - received).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn extractor() -> FieldExtractor {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        FieldExtractor::deterministic(42, now)
    }

    fn record(value: Value) -> RawRecord {
        RawRecord::from_value(value)
    }

    #[test]
    fn test_columns_win_over_raw() {
        let rec = record(json!({
            "result": {
                "fields.x-b3-traceid": ["T-col"],
                "fields.ClientAppName": ["web"],
                "fields.StatusCode": ["503"],
                "event": ["checkout.start"],
                "_time": "2024-05-01T10:00:00.000+00:00",
                "_raw": r#"{"event":"raw-event","fields":{"x-b3-traceid":"T-raw","ClientAppName":"raw-app","StatusCode":"201"}}"#
            }
        }));

        let fields = extractor().extract(&rec);
        assert_eq!(fields.trace_id.as_deref(), Some("T-col"));
        assert_eq!(fields.client_app_name, "web");
        assert_eq!(fields.status_code, 503);
        assert_eq!(fields.event, "checkout.start");
        assert_eq!(fields.timestamp, "2024-05-01T10:00:00.000+00:00");
    }

    #[test]
    fn test_raw_fallbacks() {
        let rec = record(json!({
            "result": {
                "_raw": "{\"event\":\"login\",\"fields\":{\"x-b3-traceid\":\"T-raw\",\"ClientAppName\":\"auth\",\"StatusCode\":401,\"accountId\":\"acc-1\"}}"
            }
        }));

        let fields = extractor().extract(&rec);
        assert_eq!(fields.trace_id.as_deref(), Some("T-raw"));
        assert_eq!(fields.client_app_name, "auth");
        assert_eq!(fields.status_code, 401);
        assert_eq!(fields.event, "login");
        assert_eq!(fields.account_id.as_deref(), Some("acc-1"));
        assert_eq!(fields.correlation_id, None);
        assert_eq!(fields.raw_fields.get("ClientAppName"), Some(&json!("auth")));
    }

    #[test]
    fn test_event_from_raw_fields() {
        let rec = record(json!({"result": {"_raw": r#"{"fields":{"event":"nested-event"}}"#}}));
        assert_eq!(extractor().extract(&rec).event, "nested-event");
    }

    #[test]
    fn test_defaults() {
        let fields = extractor().extract(&record(json!({"result": {}})));
        assert_eq!(fields.trace_id, None);
        assert_eq!(fields.client_app_name, UNKNOWN_APP);
        assert_eq!(fields.status_code, DEFAULT_STATUS_CODE);
        assert_eq!(fields.event, NO_EVENT);
        assert_eq!(fields.timestamp, "2024-05-01T12:00:00.000Z");
        assert_eq!(fields.latency, 42);
        assert!(fields.raw_fields.is_empty());
    }

    #[test]
    fn test_unparseable_raw_treated_as_absent() {
        let rec = record(json!({
            "result": {"_raw": "total garbage", "fields.ClientAppName": ["svc"]}
        }));
        let fields = extractor().extract(&rec);
        assert_eq!(fields.client_app_name, "svc");
        assert!(fields.raw_fields.is_empty());
    }

    #[test]
    fn test_unparseable_status_code_defaults() {
        let rec = record(json!({"result": {"fields.StatusCode": ["n/a"]}}));
        assert_eq!(extractor().extract(&rec).status_code, 200);

        // The column is present, so the payload value is never consulted
        let rec = record(json!({
            "result": {
                "fields.StatusCode": ["n/a"],
                "_raw": r#"{"fields":{"StatusCode":"500"}}"#
            }
        }));
        assert_eq!(extractor().extract(&rec).status_code, 200);

        let rec = record(json!({"result": {"_raw": r#"{"fields":{"StatusCode":"500"}}"#}}));
        assert_eq!(extractor().extract(&rec).status_code, 500);
    }

    #[test]
    fn test_measured_latency() {
        let rec = record(json!({
            "result": {
                "_raw": r#"{"fields":{"client.received.time":1000,"client.sent.time":"1175"}}"#
            }
        }));
        assert_eq!(extractor().extract(&rec).latency, 175);
    }

    #[test]
    fn test_parse_status_code() {
        assert_eq!(parse_status_code("500"), Some(500));
        assert_eq!(parse_status_code(" 404 "), Some(404));
        assert_eq!(parse_status_code("503 Service Unavailable"), Some(503));
        assert_eq!(parse_status_code("200.0"), Some(200));
        assert_eq!(parse_status_code("-1"), Some(-1));
        assert_eq!(parse_status_code("abc"), None);
        assert_eq!(parse_status_code(""), None);
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00.000+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00.000+0000"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_trace_id_only() {
        let ex = extractor();
        let rec = record(json!({"result": {"_raw": r#"{"fields":{"x-b3-traceid":"abc"}}"#}}));
        assert_eq!(ex.trace_id(&rec).as_deref(), Some("abc"));
        assert_eq!(ex.trace_id(&record(json!({}))), None);
    }
}
