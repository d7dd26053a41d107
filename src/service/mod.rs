//! Query service over one static record set
//!
//! Owns the records for the lifetime of the process and memoizes derived
//! views. Caches are append-only and filled lazily, one key at a time:
//! - the trace listing and the event list, derived once on first use
//! - cluster lists, keyed by every parameter that affects them
//! - graphs, keyed by trace id or by window start and length

use crate::cluster::{cluster_by_time, enrich_clusters, events_from_traces, ClusterSummary, Event};
use crate::config::Config;
use crate::dataset::RecordSource;
use crate::error::Result;
use crate::extract::FieldExtractor;
use crate::graph::{GraphBuilder, GraphData, Layout};
use crate::query::QueryParams;
use crate::record::RawRecord;
use crate::trace::{collect_trace_ids, TraceIdEntry};
use ahash::{HashMap, HashMapExt};
use chrono::{DateTime, Utc};
use std::hash::Hash;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Cache key of a graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphKey {
    Trace(String),
    Window {
        start: Option<DateTime<Utc>>,
        window_ms: i64,
    },
}

/// Number of memoized entries per cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cluster_entries: usize,
    pub graph_entries: usize,
}

/// Append-only memo table
struct MemoCache<K, V> {
    entries: Mutex<HashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash + Clone, V> MemoCache<K, V> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_insert_with(&self, key: &K, compute: impl FnOnce() -> V) -> Arc<V> {
        if let Some(hit) = self.lock().get(key) {
            return hit.clone();
        }

        // Compute outside the lock; a concurrent insert for the same key wins
        let value = Arc::new(compute());
        self.lock().entry(key.clone()).or_insert(value).clone()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, Arc<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Trace and cluster queries over a fixed record set
pub struct TraceService {
    records: Vec<RawRecord>,
    extractor: FieldExtractor,
    graphs: GraphBuilder,
    enforce_time_range: bool,
    default_window_ms: i64,

    traces: OnceLock<Vec<TraceIdEntry>>,
    events: OnceLock<Vec<Event>>,
    cluster_cache: MemoCache<QueryParams, Vec<ClusterSummary>>,
    graph_cache: MemoCache<GraphKey, GraphData>,
}

impl TraceService {
    /// Create a service with default layout and time-range enforcement on
    pub fn new(records: Vec<RawRecord>, extractor: FieldExtractor) -> Self {
        Self {
            records,
            extractor,
            graphs: GraphBuilder::default(),
            enforce_time_range: true,
            default_window_ms: crate::cluster::DEFAULT_TIME_WINDOW_MS,
            traces: OnceLock::new(),
            events: OnceLock::new(),
            cluster_cache: MemoCache::new(),
            graph_cache: MemoCache::new(),
        }
    }

    /// Fetch records from `source` and apply `config`
    pub fn from_source(source: &dyn RecordSource, config: &Config) -> Result<Self> {
        let records = source.fetch()?;
        tracing::info!(
            "Trace service ready with {} record(s) from {}",
            records.len(),
            source.describe()
        );
        Ok(Self::new(records, config.field_extractor())
            .with_layout(config.layout.to_layout())
            .with_enforce_time_range(config.query.enforce_time_range)
            .with_default_window(config.clustering.time_window_ms))
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.graphs = GraphBuilder::new(layout);
        self
    }

    pub fn with_enforce_time_range(mut self, enforce: bool) -> Self {
        self.enforce_time_range = enforce;
        self
    }

    pub fn with_default_window(mut self, window_ms: i64) -> Self {
        self.default_window_ms = window_ms;
        self
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn default_window_ms(&self) -> i64 {
        self.default_window_ms
    }

    /// One entry per distinct trace id, first-seen order
    pub fn trace_ids(&self) -> &[TraceIdEntry] {
        self.traces
            .get_or_init(|| collect_trace_ids(&self.records, &self.extractor))
    }

    fn all_events(&self) -> &[Event] {
        self.events.get_or_init(|| events_from_traces(self.trace_ids()))
    }

    /// Events matching the search and, when enforced, the time range
    pub fn events(&self, params: &QueryParams) -> Vec<Event> {
        params.apply(self.all_events().to_vec(), self.enforce_time_range)
    }

    /// Enriched clusters for `params`, memoized per full parameter tuple
    pub fn clusters(&self, params: &QueryParams) -> Arc<Vec<ClusterSummary>> {
        self.cluster_cache.get_or_insert_with(params, || {
            let events = self.events(params);
            let clusters = enrich_clusters(cluster_by_time(&events, params.time_window_ms));
            tracing::info!(
                "Built {} cluster(s) from {} event(s) for {}={:?} over {} with window {}ms",
                clusters.len(),
                events.len(),
                params.search_type,
                params.search_value,
                params.time_range,
                params.time_window_ms
            );
            clusters
        })
    }

    /// Graph of one trace
    pub fn trace_graph(&self, trace_id: &str) -> Arc<GraphData> {
        let key = GraphKey::Trace(trace_id.to_string());
        self.graph_cache.get_or_insert_with(&key, || {
            self.graphs
                .build_trace_graph(&self.records, trace_id, &self.extractor)
        })
    }

    /// Graph of the records in `[start, start + window_ms]`, or of every record without a start
    pub fn window_graph(&self, start: Option<DateTime<Utc>>, window_ms: i64) -> Arc<GraphData> {
        let key = GraphKey::Window { start, window_ms };
        self.graph_cache.get_or_insert_with(&key, || {
            self.graphs
                .build_window_graph(&self.records, window_ms, start, &self.extractor)
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            cluster_entries: self.cluster_cache.len(),
            graph_entries: self.graph_cache.len(),
        }
    }
}
