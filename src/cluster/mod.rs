//! Time-proximity clustering of events
//!
//! This module provides:
//! - The generalized `Event` shared by trace listings and clustering
//! - Consecutive-gap clustering (`cluster_by_time`)
//! - Bounded window selection for single-cluster graphs (`select_window`)
//! - Cluster enrichment and deterministic cluster ids (`enrich`)
//!
//! Clustering is consecutive-gap, not centroid or density based: a slow
//! trickle of events each within the window of its predecessor forms one
//! cluster whose total span may exceed the window.

mod enrich;

pub use enrich::{cluster_id, enrich_clusters, ClusterStatus, ClusterSummary, UNKNOWN_SERVICE};

use crate::extract::parse_timestamp;
use crate::trace::{Status, TraceIdEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default window between consecutive events of one cluster
pub const DEFAULT_TIME_WINDOW_MS: i64 = 300_000;

/// Anything that can be placed on a timeline
pub trait Timestamped {
    fn timestamp_ms(&self) -> i64;
}

/// Normalized event, the common currency of listings and clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_app_name: Option<String>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Event {
    /// Minimal event, mostly useful for callers building events by hand
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, status: Status) -> Self {
        Self {
            id: id.into(),
            timestamp,
            service: None,
            client_app_name: None,
            status,
            event: None,
            trace_id: None,
            correlation_id: None,
            account_id: None,
            parent_id: None,
        }
    }

    /// Set the emitting service
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Event for one trace listing entry
    ///
    /// Returns `None` when the entry's timestamp cannot be parsed, since
    /// such an entry cannot be placed on a timeline.
    pub fn from_trace_entry(entry: &TraceIdEntry) -> Option<Self> {
        let timestamp = parse_timestamp(&entry.timestamp)?;
        Some(Self {
            id: entry.id.clone(),
            timestamp,
            service: Some(entry.client_app_name.clone()),
            client_app_name: Some(entry.client_app_name.clone()),
            status: entry.status,
            event: Some(entry.event.clone()),
            trace_id: Some(entry.id.clone()),
            correlation_id: entry.correlation_id.clone(),
            account_id: entry.account_id.clone(),
            parent_id: None,
        })
    }
}

impl Timestamped for Event {
    fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Derive the event list from trace listing entries
///
/// Entries whose timestamp cannot be parsed are dropped with a warning.
pub fn events_from_traces(entries: &[TraceIdEntry]) -> Vec<Event> {
    entries
        .iter()
        .filter_map(|entry| {
            let event = Event::from_trace_entry(entry);
            if event.is_none() {
                tracing::warn!(
                    "Dropping trace {} from timeline: unparseable timestamp {:?}",
                    entry.id,
                    entry.timestamp
                );
            }
            event
        })
        .collect()
}

/// Partition items into clusters of time-adjacent items
///
/// # Algorithm
/// 1. Stable sort a copy ascending by timestamp (ties keep input order)
/// 2. Walk the sorted items; an item joins the current cluster when its gap
///    to the previous item is at most `window_ms`, otherwise it opens a new one
///
/// Clusters are returned in chronological order of their first item.
pub fn cluster_by_time<T: Timestamped + Clone>(items: &[T], window_ms: i64) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }

    let mut sorted = items.to_vec();
    sorted.sort_by_key(|item| item.timestamp_ms());

    let mut clusters: Vec<Vec<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut previous_ms: Option<i64> = None;

    for item in sorted {
        let ms = item.timestamp_ms();
        if let Some(prev) = previous_ms {
            if ms - prev > window_ms {
                clusters.push(std::mem::take(&mut current));
            }
        }
        previous_ms = Some(ms);
        current.push(item);
    }
    clusters.push(current);

    tracing::debug!(
        "Clustered {} item(s) into {} cluster(s) with window {}ms",
        items.len(),
        clusters.len(),
        window_ms
    );

    clusters
}

/// Items inside one bounded window, sorted ascending by timestamp
///
/// With a `start`, only items in `[start, start + window_ms]` (inclusive)
/// are kept; without one, every item is kept. No partitioning happens.
/// The window end saturates, so an oversized `window_ms` is unbounded.
pub fn select_window<T: Timestamped + Clone>(
    items: &[T],
    window_ms: i64,
    start: Option<DateTime<Utc>>,
) -> Vec<T> {
    let mut selected: Vec<T> = match start {
        Some(start) => {
            let from = start.timestamp_millis();
            let to = from.saturating_add(window_ms);
            items
                .iter()
                .filter(|item| (from..=to).contains(&item.timestamp_ms()))
                .cloned()
                .collect()
        }
        None => items.to_vec(),
    };
    selected.sort_by_key(|item| item.timestamp_ms());
    selected
}
