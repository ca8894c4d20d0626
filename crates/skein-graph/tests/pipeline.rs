//! End-to-end pipeline tests: raw JSONL through the ingestor into the
//! graph and out through the query surface.

use skein_graph::{BranchLabel, SessionGraph};
use skein_ingest::ingest_reader;

/// Ten records: a three-turn main thread, a delegation with a
/// three-record sidechain run, one compaction pair, and one
/// post-compaction orphan whose logical link bridges the boundary.
const SCENARIO: &str = r#"{"type":"participant","uuid":"r01","sessionId":"s1","timestamp":"2026-02-10T09:00:00Z","payload":"the test suite is flaky, find out why"}
{"type":"responder","uuid":"r02","parentUuid":"r01","sessionId":"s1","timestamp":"2026-02-10T09:00:05Z","payload":"I'll delegate the investigation."}
{"type":"responder","uuid":"r03","parentUuid":"r02","sessionId":"s1","timestamp":"2026-02-10T09:00:06Z","delegation":{"agent":"bug-hunter","prompt":"Chase the flaky test in ci.rs"}}
{"type":"participant","uuid":"r04","parentUuid":"r03","sessionId":"s1","timestamp":"2026-02-10T09:00:07Z","payload":"Chase the flaky test in ci.rs","isSidechain":true,"isExternalRequester":true}
{"type":"responder","uuid":"r05","parentUuid":"r04","sessionId":"s1","timestamp":"2026-02-10T09:00:20Z","payload":"Reproduced under load.","isSidechain":true}
{"type":"responder","uuid":"r06","parentUuid":"r05","sessionId":"s1","timestamp":"2026-02-10T09:00:41Z","payload":"Root cause: unseeded RNG.","isSidechain":true}
{"type":"compaction","uuid":"r07","parentUuid":"r03","sessionId":"s1","timestamp":"2026-02-10T09:01:00Z","metadata":{"phase":"begin","trigger":"auto"}}
{"type":"compaction","uuid":"r08","parentUuid":"r07","sessionId":"s1","timestamp":"2026-02-10T09:01:02Z","metadata":{"phase":"end","preservedRecords":4,"totalRecords":8,"compressionRatio":0.5,"trigger":"auto"}}
{"type":"participant","uuid":"r09","parentUuid":"r-old-99","logicalParentUuid":"r08","sessionId":"s1","timestamp":"2026-02-10T09:02:00Z","payload":"seed it and rerun"}
{"type":"responder","uuid":"r10","parentUuid":"r09","sessionId":"s1","timestamp":"2026-02-10T09:02:09Z","payload":"Done, suite is green."}
"#;

fn scenario_graph() -> SessionGraph {
    let outcome = ingest_reader(SCENARIO.as_bytes()).unwrap();
    assert!(outcome.errors.is_empty());
    SessionGraph::from_outcome(outcome)
}

#[test]
fn scenario_statistics() {
    let stats = scenario_graph().stats();

    assert_eq!(stats.total_records, 10);
    assert_eq!(stats.orphans, 1);
    assert_eq!(stats.sidechain_runs, 1);
    assert_eq!(stats.compaction_epochs, 1);
    assert_eq!(stats.branches, 1);
    assert_eq!(stats.parse_errors, 0);
    assert_eq!(stats.participant_turns, 3);
    assert_eq!(stats.responder_turns, 5);
    assert_eq!(stats.compaction_markers, 2);
    assert_eq!(stats.delegated_agents, vec!["bug-hunter".to_string()]);
    assert_eq!(stats.duration_ms, Some(129_000));
}

#[test]
fn sidechain_is_attributed_to_its_agent() {
    let graph = scenario_graph();
    let runs = graph.sidechain_runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].agent, "bug-hunter");
    assert_eq!(runs[0].len(), 3);
    assert_eq!(runs[0].invocation, Some("r03".into()));

    let records = graph.run_records(&runs[0]);
    assert_eq!(records[0].id.as_str(), "r04");
    assert!(records[0].requester_is_controller());
}

#[test]
fn ancestors_resolve_through_the_compaction_boundary() {
    let graph = scenario_graph();

    assert!(graph.is_orphan(&"r09".into()).unwrap());
    assert_eq!(graph.epoch_of(&"r09".into()).unwrap(), 1);
    assert_eq!(graph.epoch_of(&"r03".into()).unwrap(), 0);

    let ids: Vec<&str> = graph
        .ancestors(&"r10".into())
        .unwrap()
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(ids, vec!["r09", "r08", "r07", "r03", "r02", "r01"]);

    let epoch = &graph.epochs()[0];
    assert_eq!(epoch.index, 1);
    let stats = epoch.stats.as_ref().unwrap();
    assert_eq!(stats.preserved_records, Some(4));
    assert_eq!(stats.compression_ratio, Some(0.5));
}

#[test]
fn active_thread_skips_the_sidechain() {
    let graph = scenario_graph();

    // The markers sit on the spine; the sidechain run under r03 was
    // superseded by the later continuation and stays off the thread.
    let ids: Vec<&str> = graph
        .active_thread()
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(ids, vec!["r01", "r02", "r03", "r07", "r08", "r09", "r10"]);
    assert_eq!(graph.main_thread().len(), 7);

    assert_eq!(
        graph.branch_label(&"r10".into()).unwrap(),
        BranchLabel::Active
    );
    assert_eq!(
        graph.branch_label(&"r06".into()).unwrap(),
        BranchLabel::Abandoned
    );
}

#[test]
fn pipeline_is_idempotent() {
    let a = scenario_graph();
    let b = scenario_graph();

    assert_eq!(a.stats(), b.stats());
    assert_eq!(a.warnings(), b.warnings());
    assert_eq!(a.sidechain_runs(), b.sidechain_runs());
    assert_eq!(a.epochs(), b.epochs());
    let roots = |g: &SessionGraph| {
        g.roots()
            .iter()
            .map(|r| r.id.to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(roots(&a), roots(&b));
}

#[test]
fn reserialization_reproduces_the_original_lines() {
    let outcome = ingest_reader(SCENARIO.as_bytes()).unwrap();
    for (rec, line) in outcome.records.iter().zip(SCENARIO.lines()) {
        let reserialized = serde_json::to_value(rec).unwrap();
        let original: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(reserialized, original, "record {}", rec.id);
    }
}

#[test]
fn reconstruct_from_a_file() {
    use std::io::Write;

    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("session.jsonl");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(SCENARIO.as_bytes())
        .unwrap();

    let graph =
        skein_graph::reconstruct_path(&path, skein_ingest::RetryPolicy::default()).unwrap();
    assert_eq!(graph.stats().total_records, 10);
}

#[test]
fn damaged_input_still_yields_a_graph() {
    let damaged = format!("{SCENARIO}not json\n{{\"type\":\"noise\"}}\n");
    let outcome = ingest_reader(damaged.as_bytes()).unwrap();
    assert_eq!(outcome.errors.len(), 2);

    let graph = SessionGraph::from_outcome(outcome);
    let stats = graph.stats();
    assert_eq!(stats.total_records, 10);
    assert_eq!(stats.parse_errors, 2);
    assert_eq!(stats.branches, 1);
}
