// Tests for report rendering

use chrono::Utc;
use coinflow_core::attribution::AttributionRun;
use coinflow_core::report::{
    ReportError, ReportFormat, build_flow_graph, generate_csv_pool_report,
    generate_csv_walk_report, generate_dot_report, generate_json_pool_report,
    generate_json_walk_report, generate_pool_report, generate_text_pool_report,
    generate_text_walk_report, save_report, summarize,
};
use coinflow_core::taint::TaintRun;
use coinflow_scanner::{
    PoolAttribution, ResultGraph, TransactionNode, WalkSettings, default_pools,
};

fn node(id: &str, inputs: &[&str], outputs: &[&str]) -> TransactionNode {
    TransactionNode::new(
        id.to_string(),
        inputs.iter().map(|s| s.to_string()).collect(),
        outputs.iter().map(|s| s.to_string()).collect(),
    )
}

/// seed -> {a, b}, a -> c, b -> c, plus an unresolved d.
fn sample_graph() -> ResultGraph {
    ResultGraph::from_steps(vec![
        vec![node("seed", &["coinbase"], &["a", "b"])],
        vec![node("a", &["seed"], &["c"]), node("b", &["seed"], &["c"])],
        vec![TransactionNode::empty("d".to_string())],
    ])
}

fn sample_run() -> TaintRun {
    let now = Utc::now();
    TaintRun {
        run_id: "run-1".to_string(),
        seed: "seed".to_string(),
        base_url: "https://explorer.test".to_string(),
        settings: WalkSettings {
            steps: 3,
            max_workers: 4,
            dedupe: false,
        },
        started_at: now,
        finished_at: now,
        degraded: 1,
        graph: sample_graph(),
    }
}

fn sample_attribution_run() -> AttributionRun {
    let mut attribution = PoolAttribution::new();
    attribution.insert_pool("Eligius", vec!["1Eli".to_string(), "1Shared".to_string()]);
    attribution.insert_pool("DeepBit", vec!["1Deep".to_string(), "1Shared".to_string()]);
    let now = Utc::now();
    AttributionRun {
        run_id: "run-2".to_string(),
        base_url: "https://explorer.test".to_string(),
        pools: default_pools()[..2].to_vec(),
        started_at: now,
        finished_at: now,
        attribution,
    }
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("Dot"), Some(ReportFormat::Dot));
    assert_eq!(ReportFormat::from_str("graphviz"), Some(ReportFormat::Dot));
    assert_eq!(ReportFormat::from_str("csv"), Some(ReportFormat::Csv));
}

#[test]
fn test_report_format_from_str_invalid() {
    assert!(ReportFormat::from_str("html").is_none());
    assert!(ReportFormat::from_str("").is_none());
}

#[test]
fn test_report_format_extension() {
    assert_eq!(ReportFormat::Dot.extension(), "dot");
    assert_eq!(ReportFormat::Text.extension(), "txt");
}

// ============================================================================
// Flow Graph Tests
// ============================================================================

#[test]
fn test_flow_graph_merges_repeated_transactions() {
    let flow = build_flow_graph(&sample_graph());

    // seed, a, b, c, d
    assert_eq!(flow.node_count(), 5);
    // seed->a, seed->b, a->c, b->c
    assert_eq!(flow.edge_count(), 4);
}

#[test]
fn test_summary_counts() {
    let summary = summarize(&sample_graph());

    assert_eq!(summary.recorded, 4);
    assert_eq!(summary.transactions, 5);
    assert_eq!(summary.edges, 4);
    // c was never resolved and d has no outputs
    assert_eq!(summary.sinks, 2);
}

#[test]
fn test_summary_of_empty_graph() {
    let summary = summarize(&ResultGraph::new());
    assert_eq!(summary.recorded, 0);
    assert_eq!(summary.edges, 0);
}

// ============================================================================
// Walk Report Tests
// ============================================================================

#[test]
fn test_text_walk_report_sections() {
    let report = generate_text_walk_report(&sample_run());

    assert!(report.contains("COINFLOW TAINT WALK REPORT"));
    assert!(report.contains("Run ID:       run-1"));
    assert!(report.contains("Seed:         seed"));
    assert!(report.contains("Degraded nodes:      1"));
    assert!(report.contains("## Step 0"));
    assert!(report.contains("## Step 2"));
    assert!(report.contains("    -> c"));
    assert!(report.contains("d (unresolved)"));
}

#[test]
fn test_json_walk_report_structure() {
    let json = generate_json_walk_report(&sample_run()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let report = &value["report"];
    assert_eq!(report["metadata"]["generator"], "coinflow");
    assert_eq!(report["run"]["seed"], "seed");
    assert_eq!(report["summary"]["nodes"], 4);
    assert_eq!(report["summary"]["step_sizes"], serde_json::json!([1, 2, 1]));

    let nodes = report["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes[0]["id"], "seed");
    assert_eq!(nodes[0]["outputs"], serde_json::json!(["a", "b"]));
    assert_eq!(nodes[3]["inputs"], serde_json::json!([]));
}

#[test]
fn test_dot_report_contains_edges() {
    let dot = generate_dot_report(&sample_graph());

    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("\"seed\""));
    assert!(dot.contains("->"));
    assert_eq!(dot.matches("->").count(), 4);
}

#[test]
fn test_csv_walk_report_rows() {
    let csv = generate_csv_walk_report(&sample_graph()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], "source,target,step");
    assert_eq!(lines.len(), 5);
    assert!(lines.contains(&"seed,a,0"));
    assert!(lines.contains(&"b,c,1"));
}

// ============================================================================
// Pool Report Tests
// ============================================================================

#[test]
fn test_later_pool_wins_in_reports() {
    let run = sample_attribution_run();
    let csv = generate_csv_pool_report(&run).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], "address,pool");
    assert!(lines.contains(&"1Shared,DeepBit"));
    assert!(!lines.contains(&"1Shared,Eligius"));
    assert_eq!(lines.len(), 4);
}

#[test]
fn test_csv_pool_report_quotes_awkward_values() {
    let mut attribution = PoolAttribution::new();
    attribution.insert_pool("Pool, Inc", vec!["1Plain".to_string()]);
    attribution.insert_pool("Quoted \"Q\"", vec!["1Car\rriage".to_string()]);
    let mut run = sample_attribution_run();
    run.attribution = attribution;

    let csv = generate_csv_pool_report(&run).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert!(lines.contains(&"1Plain,\"Pool, Inc\""));
    assert!(lines.contains(&"\"1Car\rriage\",\"Quoted \"\"Q\"\"\""));
}

#[test]
fn test_csv_walk_report_quotes_ids_with_commas() {
    let graph = ResultGraph::from_steps(vec![vec![node("s,1", &[], &["t\r2"])]]);

    let csv = generate_csv_walk_report(&graph).unwrap();

    assert_eq!(csv.lines().nth(1), Some("\"s,1\",\"t\r2\",0"));
}

#[test]
fn test_text_pool_report() {
    let report = generate_text_pool_report(&sample_attribution_run());

    assert!(report.contains("COINFLOW POOL ATTRIBUTION REPORT"));
    assert!(report.contains("Addresses:    3"));
    assert!(report.contains("Eligius.st"));
    assert!(report.contains("1 addresses (2 listed)"));
    assert!(report.contains("## DeepBit"));
    assert!(report.contains("  1Eli\n"));
}

#[test]
fn test_json_pool_report() {
    let json = generate_json_pool_report(&sample_attribution_run()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let report = &value["report"];
    assert_eq!(report["summary"]["total_addresses"], 3);
    assert_eq!(report["summary"]["addresses_per_pool"]["Eligius"], 1);
    assert_eq!(report["summary"]["addresses_per_pool"]["DeepBit"], 2);
    assert_eq!(report["summary"]["listed_per_pool"]["Eligius"], 2);
    assert_eq!(report["addresses"]["1Shared"], "DeepBit");
    assert_eq!(report["run"]["pools"][0]["wallet"], "Eligius.st");
}

#[test]
fn test_pool_report_rejects_dot() {
    let result = generate_pool_report(&sample_attribution_run(), ReportFormat::Dot);
    assert!(matches!(result, Err(ReportError::Unsupported(_))));
}

// ============================================================================
// Saving
// ============================================================================

#[test]
fn test_save_report_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.dot");
    let content = generate_dot_report(&sample_graph());

    save_report(&content, &path).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
}
