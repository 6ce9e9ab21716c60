// Report rendering for taint walks and pool attributions

use crate::attribution::AttributionRun;
use crate::taint::TaintRun;
use coinflow_scanner::ResultGraph;
use petgraph::Direction;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

const HEAVY_RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Dot,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "dot" | "graphviz" => Some(ReportFormat::Dot),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Dot => "dot",
            ReportFormat::Csv => "csv",
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("{0} reports are not available for this output")]
    Unsupported(&'static str),
}

/// Shape of the money flow described by a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSummary {
    /// Nodes as recorded, repeats included.
    pub recorded: usize,
    /// Distinct transaction ids.
    pub transactions: usize,
    pub edges: usize,
    /// Transactions whose outputs were not followed any further.
    pub sinks: usize,
}

/// Build a directed graph with one vertex per distinct transaction and an
/// edge `id -> output` labelled with the step the spending transaction was
/// found in.
pub fn build_flow_graph(graph: &ResultGraph) -> DiGraph<String, usize> {
    let mut flow = DiGraph::new();
    let mut index: HashMap<String, NodeIndex> = HashMap::new();

    let mut vertex = |flow: &mut DiGraph<String, usize>, id: &str| -> NodeIndex {
        *index
            .entry(id.to_string())
            .or_insert_with(|| flow.add_node(id.to_string()))
    };

    for (step, node) in nodes_with_step(graph) {
        let source = vertex(&mut flow, node.id());
        for output in node.outputs() {
            let target = vertex(&mut flow, output);
            flow.update_edge(source, target, step);
        }
    }

    flow
}

pub fn summarize(graph: &ResultGraph) -> FlowSummary {
    let flow = build_flow_graph(graph);
    FlowSummary {
        recorded: graph.len(),
        transactions: flow.node_count(),
        edges: flow.edge_count(),
        sinks: flow.externals(Direction::Outgoing).count(),
    }
}

/// Pair every recorded node with the step it was discovered in.
fn nodes_with_step(
    graph: &ResultGraph,
) -> impl Iterator<Item = (usize, &coinflow_scanner::TransactionNode)> {
    graph
        .step_sizes()
        .iter()
        .enumerate()
        .flat_map(|(step, size)| std::iter::repeat_n(step, *size))
        .zip(graph.nodes())
}

pub fn generate_walk_report(run: &TaintRun, format: ReportFormat) -> Result<String, ReportError> {
    Ok(match format {
        ReportFormat::Text => generate_text_walk_report(run),
        ReportFormat::Json => generate_json_walk_report(run)?,
        ReportFormat::Dot => generate_dot_report(&run.graph),
        ReportFormat::Csv => generate_csv_walk_report(&run.graph)?,
    })
}

pub fn generate_text_walk_report(run: &TaintRun) -> String {
    let summary = summarize(&run.graph);
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                         COINFLOW TAINT WALK REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Run ID:       {}\n", run.run_id));
    report.push_str(&format!("Explorer:     {}\n", run.base_url));
    report.push_str(&format!("Seed:         {}\n", run.seed));
    report.push_str(&format!(
        "Started:      {}\n",
        run.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Duration:     {} seconds\n", run.duration_secs()));
    report.push_str(&format!(
        "Steps:        {} ({} workers{})\n",
        run.settings.steps,
        run.settings.max_workers,
        if run.settings.dedupe { ", deduplicated" } else { "" }
    ));
    report.push('\n');

    report.push_str(HEAVY_RULE);
    report.push_str("SUMMARY\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str(&format!("  Nodes recorded:      {}\n", summary.recorded));
    report.push_str(&format!("  Distinct txs:        {}\n", summary.transactions));
    report.push_str(&format!("  Flow edges:          {}\n", summary.edges));
    report.push_str(&format!("  Unfollowed outputs:  {}\n", summary.sinks));
    report.push_str(&format!("  Degraded nodes:      {}\n", run.degraded));
    report.push('\n');

    report.push_str("  Nodes per step:\n");
    for (step, size) in run.graph.step_sizes().iter().enumerate() {
        report.push_str(&format!("    [{}] {}\n", step, size));
    }
    report.push('\n');

    report.push_str(HEAVY_RULE);
    report.push_str("TRANSACTIONS\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    let mut current_step = None;
    for (step, node) in nodes_with_step(&run.graph) {
        if current_step != Some(step) {
            if current_step.is_some() {
                report.push_str(LIGHT_RULE);
            }
            report.push_str(&format!("## Step {}\n", step));
            current_step = Some(step);
        }

        if node.is_empty() {
            report.push_str(&format!("  {} (unresolved)\n", node.id()));
            continue;
        }

        report.push_str(&format!(
            "  {}  {} in / {} out\n",
            node.id(),
            node.inputs().len(),
            node.outputs().len()
        ));
        for output in node.outputs() {
            report.push_str(&format!("    -> {}\n", output));
        }
    }
    report.push('\n');

    report.push_str(HEAVY_RULE);
    report.push_str("\nGenerated by coinflow\n");
    report
}

pub fn generate_json_walk_report(run: &TaintRun) -> Result<String, serde_json::Error> {
    let summary = summarize(&run.graph);
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "coinflow",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "run": {
                "id": run.run_id,
                "explorer": run.base_url,
                "seed": run.seed,
                "steps": run.settings.steps,
                "max_workers": run.settings.max_workers,
                "dedupe": run.settings.dedupe,
                "start_time": run.started_at.to_rfc3339(),
                "end_time": run.finished_at.to_rfc3339(),
                "duration_seconds": run.duration_secs()
            },
            "summary": {
                "nodes": summary.recorded,
                "transactions": summary.transactions,
                "edges": summary.edges,
                "sinks": summary.sinks,
                "degraded": run.degraded,
                "step_sizes": run.graph.step_sizes()
            },
            "nodes": run.graph.nodes()
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// Graphviz rendering of the flow graph.
pub fn generate_dot_report(graph: &ResultGraph) -> String {
    let flow = build_flow_graph(graph);
    format!("{}", Dot::with_config(&flow, &[]))
}

/// `source,target,step` edge list.
pub fn generate_csv_walk_report(graph: &ResultGraph) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["source", "target", "step"])?;
    for (step, node) in nodes_with_step(graph) {
        let step = step.to_string();
        for output in node.outputs() {
            writer.write_record([node.id(), output.as_str(), step.as_str()])?;
        }
    }
    finish_csv(writer)
}

pub fn generate_pool_report(
    run: &AttributionRun,
    format: ReportFormat,
) -> Result<String, ReportError> {
    match format {
        ReportFormat::Text => Ok(generate_text_pool_report(run)),
        ReportFormat::Json => Ok(generate_json_pool_report(run)?),
        ReportFormat::Csv => generate_csv_pool_report(run),
        ReportFormat::Dot => Err(ReportError::Unsupported("DOT")),
    }
}

pub fn generate_text_pool_report(run: &AttributionRun) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                       COINFLOW POOL ATTRIBUTION REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Run ID:       {}\n", run.run_id));
    report.push_str(&format!("Explorer:     {}\n", run.base_url));
    report.push_str(&format!(
        "Started:      {}\n",
        run.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!(
        "Duration:     {} seconds\n",
        (run.finished_at - run.started_at).num_seconds()
    ));
    report.push_str(&format!("Addresses:    {}\n", run.attribution.len()));
    report.push('\n');

    report.push_str(HEAVY_RULE);
    report.push_str("POOLS\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');
    let attributed = run.attribution.addresses_per_pool();
    let listed = run.attribution.listed_per_pool();
    for pool in &run.pools {
        report.push_str(&format!(
            "  {:<12} {:<16} {} addresses ({} listed)\n",
            pool.name,
            pool.wallet,
            attributed.get(&pool.name).copied().unwrap_or(0),
            listed.get(&pool.name).copied().unwrap_or(0)
        ));
    }
    report.push('\n');

    report.push_str(HEAVY_RULE);
    report.push_str("ADDRESSES\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    let mut current_pool = None;
    for (address, pool) in run.attribution.entries() {
        if current_pool != Some(pool) {
            if current_pool.is_some() {
                report.push_str(LIGHT_RULE);
            }
            report.push_str(&format!("## {}\n", pool));
            current_pool = Some(pool);
        }
        report.push_str(&format!("  {}\n", address));
    }
    report.push('\n');

    report.push_str(HEAVY_RULE);
    report.push_str("\nGenerated by coinflow\n");
    report
}

pub fn generate_json_pool_report(run: &AttributionRun) -> Result<String, serde_json::Error> {
    let addresses: BTreeMap<&str, &str> = run.attribution.entries().into_iter().collect();
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "coinflow",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "run": {
                "id": run.run_id,
                "explorer": run.base_url,
                "pools": run.pools,
                "start_time": run.started_at.to_rfc3339(),
                "end_time": run.finished_at.to_rfc3339()
            },
            "summary": {
                "total_addresses": run.attribution.len(),
                "addresses_per_pool": run.attribution.addresses_per_pool(),
                "listed_per_pool": run.attribution.listed_per_pool()
            },
            "addresses": addresses
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// `address,pool` rows.
pub fn generate_csv_pool_report(run: &AttributionRun) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["address", "pool"])?;
    for (address, pool) in run.attribution.entries() {
        writer.write_record([address, pool])?;
    }
    finish_csv(writer)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String, ReportError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
