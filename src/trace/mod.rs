//! Trace listing: one entry per distinct trace id, in first-seen order

use crate::extract::{FieldExtractor, NormalizedFields};
use crate::record::RawRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Status codes at or above this value are errors
pub const ERROR_STATUS_THRESHOLD: i64 = 400;

/// Outcome of a traced call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Pending,
}

impl Status {
    /// `Error` iff the status code is 400 or above
    pub fn from_status_code(code: i64) -> Self {
        if code >= ERROR_STATUS_THRESHOLD {
            Self::Error
        } else {
            Self::Success
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Pending => "pending",
        }
    }
}

/// One distinct trace in a record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceIdEntry {
    pub id: String,
    pub timestamp: String,
    pub client_app_name: String,
    pub status: Status,
    pub event: String,
    /// Not part of the listing contract, carried for search filtering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl TraceIdEntry {
    fn from_fields(id: String, fields: NormalizedFields) -> Self {
        Self {
            id,
            timestamp: fields.timestamp,
            client_app_name: fields.client_app_name,
            status: Status::from_status_code(fields.status_code),
            event: fields.event,
            account_id: fields.account_id,
            correlation_id: fields.correlation_id,
        }
    }
}

/// Collect one entry per distinct trace id
///
/// Records without a resolvable trace id are skipped. Output order is the
/// first-seen order of each id; no timestamp sorting is applied.
pub fn collect_trace_ids(records: &[RawRecord], extractor: &FieldExtractor) -> Vec<TraceIdEntry> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for record in records {
        let mut fields = extractor.extract(record);
        let Some(id) = fields.trace_id.take() else {
            skipped += 1;
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        entries.push(TraceIdEntry::from_fields(id, fields));
    }

    tracing::debug!(
        "Collected {} distinct trace(s) from {} record(s), {} without trace id",
        entries.len(),
        records.len(),
        skipped
    );

    entries
}
