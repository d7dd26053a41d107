// End-to-end pipeline: export text -> traces -> events -> clusters -> graphs
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tracelens::cluster::{
    cluster_by_time, enrich_clusters, events_from_traces, ClusterStatus, Event,
};
use tracelens::dataset::parse_records;
use tracelens::extract::FieldExtractor;
use tracelens::graph::GraphBuilder;
use tracelens::record::RawRecord;
use tracelens::trace::{collect_trace_ids, Status};

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 20, 0, 0, 0).unwrap()
}

fn extractor() -> FieldExtractor {
    FieldExtractor::deterministic(120, fixed_now())
}

/// Export where some records only carry their fields inside `_raw`,
/// two records are glued together, and one `_raw` has a stray control byte
fn export_text() -> String {
    let records = [
        json!({"result": {
            "_time": "2024-04-19T08:00:00.000+00:00",
            "fields.x-b3-traceid": ["trace-aaaa1111"],
            "fields.ClientAppName": ["gateway"],
            "fields.StatusCode": ["200"],
            "event": ["order.received"],
            "_raw": r#"{"fields":{"client.received.time":1000,"client.sent.time":1040,"orderId":"o-1"}}"#
        }}),
        json!({"result": {
            "_time": "2024-04-19T08:00:00.500+00:00",
            "_raw": "{\"event\":\"order.priced\",\"fields\":{\"x-b3-traceid\":\"trace-aaaa1111\",\"ClientAppName\":\"pricing\",\"StatusCode\":\"200\",\"memo\":\"a\u{2}b\"}}"
        }}),
        json!({"result": {
            "_time": "2024-04-19T08:00:01.000+00:00",
            "fields.x-b3-traceid": ["trace-bbbb2222"],
            "fields.ClientAppName": ["inventory"],
            "fields.StatusCode": ["503"],
            "event": ["stock.check"]
        }}),
        json!({"result": {
            "_time": "2024-04-19T08:00:01.200+00:00",
            "fields.x-b3-traceid": ["trace-aaaa1111"],
            "fields.ClientAppName": ["payments"],
            "fields.StatusCode": ["402"],
            "event": ["order.charged"]
        }}),
        json!({"result": {
            "_time": "2024-04-19T09:30:00.000+00:00",
            "fields.x-b3-traceid": ["trace-cccc3333"],
            "event": ["nightly.sync"]
        }}),
        json!({"result": {"fields.ClientAppName": ["orphan"]}}),
    ];

    let lines: Vec<String> = records
        .iter()
        .map(|r| serde_json::to_string(r).unwrap())
        .collect();
    // Glue the first two records without a separator
    format!("{}{}\n{}", lines[0], lines[1], lines[2..].join("\n"))
}

fn records() -> Vec<RawRecord> {
    parse_records(&export_text()).unwrap()
}

#[test]
fn test_records_recovered_from_glued_export() {
    assert_eq!(records().len(), 6);
}

#[test]
fn test_trace_listing() {
    let entries = collect_trace_ids(&records(), &extractor());
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["trace-aaaa1111", "trace-bbbb2222", "trace-cccc3333"]);

    assert_eq!(entries[0].client_app_name, "gateway");
    assert_eq!(entries[0].status, Status::Success);
    assert_eq!(entries[1].status, Status::Error);
    assert_eq!(entries[2].client_app_name, "Unknown App");
    assert_eq!(entries[2].event, "nightly.sync");
}

#[test]
fn test_trace_graph_end_to_end() {
    let graph =
        GraphBuilder::default().build_trace_graph(&records(), "trace-aaaa1111", &extractor());

    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.edges.len(), 2);

    let apps: Vec<&str> = graph
        .nodes
        .iter()
        .map(|n| n.data.client_app_name.as_str())
        .collect();
    assert_eq!(apps, vec!["gateway", "pricing", "payments"]);

    // Measured latency on the first node, injected fallback on the rest
    assert_eq!(graph.nodes[0].data.latency, 40);
    assert_eq!(graph.nodes[1].data.latency, 120);
    assert_eq!(graph.nodes[0].data.full_log["orderId"], json!("o-1"));
    assert_eq!(graph.nodes[1].data.full_log["memo"], json!("ab"));
    assert_eq!(graph.nodes[2].data.status_code, 402);
}

#[test]
fn test_clusters_end_to_end() {
    let entries = collect_trace_ids(&records(), &extractor());
    let events: Vec<Event> = events_from_traces(&entries);
    assert_eq!(events.len(), 3);

    let clusters = enrich_clusters(cluster_by_time(&events, 300_000));
    assert_eq!(clusters.len(), 2);

    let first = &clusters[0];
    assert_eq!(first.events.len(), 2);
    assert_eq!(first.services, vec!["gateway", "inventory"]);
    assert_eq!(first.status, ClusterStatus::Mixed);
    assert_eq!(first.duration, 1_000);
    assert_eq!(
        first.id,
        format!("cluster-{}-trace-aa-2", first.start_time.timestamp_millis())
    );

    let second = &clusters[1];
    assert_eq!(second.events.len(), 1);
    assert_eq!(second.services, vec!["Unknown App"]);
    assert_eq!(second.status, ClusterStatus::Success);
    assert!(second.start_time > first.end_time);
}

#[test]
fn test_cluster_ids_stable_across_runs() {
    let run = || {
        let entries = collect_trace_ids(&records(), &extractor());
        enrich_clusters(cluster_by_time(&events_from_traces(&entries), 300_000))
            .into_iter()
            .map(|c| c.id)
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_window_graph_end_to_end() {
    let start = Utc.with_ymd_and_hms(2024, 4, 19, 8, 0, 0).unwrap();
    let graph = GraphBuilder::default().build_window_graph(
        &records(),
        300_000,
        Some(start),
        &extractor(),
    );

    let events: Vec<&str> = graph.nodes.iter().map(|n| n.data.event.as_str()).collect();
    assert_eq!(
        events,
        vec!["order.received", "order.priced", "stock.check", "order.charged"]
    );
    assert_eq!(graph.edges.len(), 3);
    assert_eq!(graph.edges[2].source, "node-3");
    assert_eq!(graph.edges[2].target, "node-4");
}
