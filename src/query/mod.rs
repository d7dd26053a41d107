//! Query parameters accepted at the boundary and the filter steps they drive

use crate::cluster::{Event, DEFAULT_TIME_WINDOW_MS};
use chrono::Duration;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which identifier a search value refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum SearchType {
    #[default]
    #[value(name = "accountId")]
    AccountId,
    #[value(name = "traceId")]
    TraceId,
    #[value(name = "correlationId")]
    CorrelationId,
}

impl SearchType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccountId => "accountId",
            Self::TraceId => "traceId",
            Self::CorrelationId => "correlationId",
        }
    }

    /// Whether `event` matches `value` under this search type
    ///
    /// Trace ids match by substring, account and correlation ids exactly.
    pub fn matches(self, event: &Event, value: &str) -> bool {
        match self {
            Self::TraceId => event
                .trace_id
                .as_deref()
                .is_some_and(|id| id.contains(value)),
            Self::AccountId => event.account_id.as_deref() == Some(value),
            Self::CorrelationId => event.correlation_id.as_deref() == Some(value),
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "accountId" => Ok(Self::AccountId),
            "traceId" => Ok(Self::TraceId),
            "correlationId" => Ok(Self::CorrelationId),
            other => Err(format!(
                "unknown search type '{}', expected accountId, traceId or correlationId",
                other
            )),
        }
    }
}

/// Look-back period relative to the newest candidate event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum TimeRange {
    #[serde(rename = "1hr")]
    #[value(name = "1hr")]
    OneHour,
    #[serde(rename = "6hr")]
    #[value(name = "6hr")]
    SixHours,
    #[default]
    #[serde(rename = "24hr")]
    #[value(name = "24hr")]
    TwentyFourHours,
    #[serde(rename = "3days")]
    #[value(name = "3days")]
    ThreeDays,
    #[serde(rename = "7days")]
    #[value(name = "7days")]
    SevenDays,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneHour => "1hr",
            Self::SixHours => "6hr",
            Self::TwentyFourHours => "24hr",
            Self::ThreeDays => "3days",
            Self::SevenDays => "7days",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OneHour => "Last 1 hour",
            Self::SixHours => "Last 6 hours",
            Self::TwentyFourHours => "Last 24 hours",
            Self::ThreeDays => "Last 3 days",
            Self::SevenDays => "Last 7 days",
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            Self::OneHour => Duration::hours(1),
            Self::SixHours => Duration::hours(6),
            Self::TwentyFourHours => Duration::hours(24),
            Self::ThreeDays => Duration::days(3),
            Self::SevenDays => Duration::days(7),
        }
    }

    /// Keep events no older than this range before the newest event
    ///
    /// The newest candidate event is the anchor, so a static export keeps
    /// its most recent activity instead of being measured against the
    /// wall clock.
    pub fn apply(self, events: Vec<Event>) -> Vec<Event> {
        let Some(anchor) = events.iter().map(|e| e.timestamp).max() else {
            return events;
        };
        let earliest = anchor - self.duration();
        events
            .into_iter()
            .filter(|e| e.timestamp >= earliest)
            .collect()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1hr" => Ok(Self::OneHour),
            "6hr" => Ok(Self::SixHours),
            "24hr" => Ok(Self::TwentyFourHours),
            "3days" => Ok(Self::ThreeDays),
            "7days" => Ok(Self::SevenDays),
            other => Err(format!(
                "unknown time range '{}', expected 1hr, 6hr, 24hr, 3days or 7days",
                other
            )),
        }
    }
}

/// Full parameter tuple of an event or cluster query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub search_value: String,
    pub search_type: SearchType,
    pub time_range: TimeRange,
    pub time_window_ms: i64,
}

impl QueryParams {
    pub fn new(search_value: impl Into<String>, search_type: SearchType) -> Self {
        Self {
            search_value: search_value.into(),
            search_type,
            ..Self::default()
        }
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    pub fn with_time_window(mut self, time_window_ms: i64) -> Self {
        self.time_window_ms = time_window_ms;
        self
    }

    /// Search filter step; an empty search value keeps every event
    pub fn filter_search(&self, events: Vec<Event>) -> Vec<Event> {
        let value = self.search_value.trim();
        if value.is_empty() {
            return events;
        }
        events
            .into_iter()
            .filter(|e| self.search_type.matches(e, value))
            .collect()
    }

    /// Search filter followed, when `enforce_time_range` is set, by the time-range filter
    pub fn apply(&self, events: Vec<Event>, enforce_time_range: bool) -> Vec<Event> {
        let events = self.filter_search(events);
        if enforce_time_range {
            self.time_range.apply(events)
        } else {
            events
        }
    }
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            search_value: String::new(),
            search_type: SearchType::default(),
            time_range: TimeRange::default(),
            time_window_ms: DEFAULT_TIME_WINDOW_MS,
        }
    }
}
