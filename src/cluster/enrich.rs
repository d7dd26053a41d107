// Cluster-level metadata: time bounds, services, aggregate status, stable ids
use super::{Event, Timestamped};
use crate::trace::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Service name for events that carry none
pub const UNKNOWN_SERVICE: &str = "unknown";

/// Aggregate status of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Success,
    Error,
    Mixed,
}

impl ClusterStatus {
    /// `Mixed` when both successes and errors are present, `Error` when only
    /// errors are, `Success` otherwise (pending events do not count either way)
    pub fn aggregate(events: &[Event]) -> Self {
        let has_error = events.iter().any(|e| e.status == Status::Error);
        let has_success = events.iter().any(|e| e.status == Status::Success);
        match (has_error, has_success) {
            (true, true) => Self::Mixed,
            (true, false) => Self::Error,
            _ => Self::Success,
        }
    }
}

/// Cluster with derived metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub id: String,
    /// Timestamp-sorted events
    pub events: Vec<Event>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `end_time - start_time` in milliseconds
    pub duration: i64,
    /// Unique services in first-seen order
    pub services: Vec<String>,
    pub status: ClusterStatus,
}

impl ClusterSummary {
    /// Summarize one cluster, `None` for an empty one
    pub fn from_events(mut events: Vec<Event>) -> Option<Self> {
        events.sort_by_key(|e| e.timestamp_ms());

        let start_time = events.first()?.timestamp;
        let end_time = events.last()?.timestamp;

        let mut services: Vec<String> = Vec::new();
        for event in &events {
            let service = event.service.as_deref().unwrap_or(UNKNOWN_SERVICE);
            if !services.iter().any(|s| s == service) {
                services.push(service.to_string());
            }
        }

        Some(Self {
            id: cluster_id(&events),
            status: ClusterStatus::aggregate(&events),
            duration: (end_time - start_time).num_milliseconds(),
            start_time,
            end_time,
            services,
            events,
        })
    }
}

/// Deterministic cluster id from first event timestamp, id prefix, and size
///
/// `cluster-<epoch ms>-<first 8 chars of first id>-<count>`; an empty
/// cluster yields `empty-cluster`.
pub fn cluster_id(events: &[Event]) -> String {
    let Some(first) = events.first() else {
        return "empty-cluster".to_string();
    };
    let prefix: String = first.id.chars().take(8).collect();
    format!(
        "cluster-{}-{}-{}",
        first.timestamp_ms(),
        prefix,
        events.len()
    )
}

/// Summarize every non-empty cluster, preserving cluster order
pub fn enrich_clusters(clusters: Vec<Vec<Event>>) -> Vec<ClusterSummary> {
    clusters
        .into_iter()
        .filter_map(ClusterSummary::from_events)
        .collect()
}
