//! Node/edge graphs for one trace or one time window
//!
//! Both graph kinds share the node shape consumed by the visualization
//! layer and connect nodes as a single linear chain. A graph is never
//! empty: when nothing matches, a single sentinel node is emitted.

use crate::cluster::{select_window, Timestamped};
use crate::extract::{parse_timestamp, FieldExtractor, NormalizedFields};
use crate::record::RawRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Node type understood by the visualization layer
pub const EVENT_NODE_TYPE: &str = "eventNode";

/// Node position on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Fixed vertical layout: every node at the same `x`, stepping down in `y`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub x: f64,
    pub y_base: f64,
    pub y_step: f64,
}

impl Layout {
    /// Position of the node at 0-based `index`
    pub fn position(&self, index: usize) -> Position {
        Position {
            x: self.x,
            y: self.y_base + index as f64 * self.y_step,
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            x: 250.0,
            y_base: 100.0,
            y_step: 100.0,
        }
    }
}

/// Payload carried by each node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub label: String,
    pub client_app_name: String,
    pub status_code: i64,
    pub latency: i64,
    pub event: String,
    /// Every extracted upstream field, for arbitrary inspection
    pub full_log: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// `node-<1-based index>`
    pub id: String,
    pub data: NodeData,
    pub position: Position,
    #[serde(rename = "type")]
    pub node_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// `edge-<i>-<i+1>`
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphData {
    /// True when the graph holds only the no-data placeholder
    pub fn is_placeholder(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].data.event == NO_DATA_EVENT
    }
}

/// Event name of the placeholder node
pub const NO_DATA_EVENT: &str = "NO_DATA";

fn node_id(index: usize) -> String {
    format!("node-{}", index + 1)
}

/// Connect nodes in construction order: node-1 → node-2 → … → node-N
///
/// This is the single place to generalize if branching call graphs (for
/// example from explicit parent ids) ever need to be modelled.
pub fn chain_edges(nodes: &[GraphNode]) -> Vec<GraphEdge> {
    nodes
        .windows(2)
        .enumerate()
        .map(|(i, pair)| GraphEdge {
            id: format!("edge-{}-{}", i + 1, i + 2),
            source: pair[0].id.clone(),
            target: pair[1].id.clone(),
        })
        .collect()
}

/// Fields of a record placed on the timeline
#[derive(Debug, Clone)]
struct TimedFields {
    fields: NormalizedFields,
    at_ms: i64,
}

impl Timestamped for TimedFields {
    fn timestamp_ms(&self) -> i64 {
        self.at_ms
    }
}

/// Builds trace and window graphs with a fixed layout
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder {
    layout: Layout,
}

impl GraphBuilder {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Graph of every record belonging to `trace_id`
    ///
    /// Records keep their input (arrival) order, which approximates causal
    /// order within a trace; they are not re-sorted by timestamp.
    pub fn build_trace_graph(
        &self,
        records: &[RawRecord],
        trace_id: &str,
        extractor: &FieldExtractor,
    ) -> GraphData {
        let fields: Vec<NormalizedFields> = records
            .iter()
            .filter(|record| extractor.trace_id(record).as_deref() == Some(trace_id))
            .map(|record| extractor.extract(record))
            .collect();

        tracing::debug!("Trace {} matched {} record(s)", trace_id, fields.len());

        if fields.is_empty() {
            return self.placeholder("No data available for this trace ID", extractor.now());
        }
        self.assemble(fields)
    }

    /// Graph of the records inside one bounded time window
    ///
    /// With `start`, keeps records in `[start, start + window_ms]`; without,
    /// keeps all records. Nodes follow timestamp order. Records whose
    /// timestamp cannot be parsed are left out.
    pub fn build_window_graph(
        &self,
        records: &[RawRecord],
        window_ms: i64,
        start: Option<DateTime<Utc>>,
        extractor: &FieldExtractor,
    ) -> GraphData {
        let timed: Vec<TimedFields> = records
            .iter()
            .map(|record| extractor.extract(record))
            .filter_map(|fields| match parse_timestamp(&fields.timestamp) {
                Some(at) => Some(TimedFields {
                    at_ms: at.timestamp_millis(),
                    fields,
                }),
                None => {
                    tracing::debug!(
                        "Skipping record with unparseable timestamp {:?}",
                        fields.timestamp
                    );
                    None
                }
            })
            .collect();

        let selected = select_window(&timed, window_ms, start);
        tracing::debug!(
            "Window of {}ms from {:?} holds {} record(s)",
            window_ms,
            start,
            selected.len()
        );

        if selected.is_empty() {
            return self.placeholder("No data available for this time window", extractor.now());
        }
        self.assemble(selected.into_iter().map(|t| t.fields).collect())
    }

    fn assemble(&self, fields: Vec<NormalizedFields>) -> GraphData {
        let nodes: Vec<GraphNode> = fields
            .into_iter()
            .enumerate()
            .map(|(index, fields)| self.node(index, fields))
            .collect();
        let edges = chain_edges(&nodes);
        GraphData { nodes, edges }
    }

    fn node(&self, index: usize, fields: NormalizedFields) -> GraphNode {
        let mut full_log = fields.raw_fields;
        full_log.insert("timestamp".to_string(), json!(fields.timestamp));
        full_log.insert("event".to_string(), json!(fields.event));
        full_log.insert("clientAppName".to_string(), json!(fields.client_app_name));
        full_log.insert("statusCode".to_string(), json!(fields.status_code));
        full_log.insert("latency".to_string(), json!(fields.latency));

        GraphNode {
            id: node_id(index),
            data: NodeData {
                label: fields.event.clone(),
                client_app_name: fields.client_app_name,
                status_code: fields.status_code,
                latency: fields.latency,
                event: fields.event,
                full_log,
            },
            position: self.layout.position(index),
            node_type: EVENT_NODE_TYPE.to_string(),
        }
    }

    fn placeholder(&self, message: &str, now: DateTime<Utc>) -> GraphData {
        let mut full_log = Map::new();
        full_log.insert("message".to_string(), json!(message));
        full_log.insert(
            "timestamp".to_string(),
            json!(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        GraphData {
            nodes: vec![GraphNode {
                id: node_id(0),
                data: NodeData {
                    label: "No Data Available".to_string(),
                    client_app_name: "Unknown".to_string(),
                    status_code: 404,
                    latency: 0,
                    event: NO_DATA_EVENT.to_string(),
                    full_log,
                },
                position: self.layout.position(0),
                node_type: EVENT_NODE_TYPE.to_string(),
            }],
            edges: Vec::new(),
        }
    }
}
