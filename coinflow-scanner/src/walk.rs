//! Bounded taint walk: a step-limited breadth-first expansion from a seed
//! transaction.
//!
//! Step 0 resolves the seed on its own. Every following step hands the
//! previous step's outputs to a [`FrontierExpander`] and appends what comes
//! back to the [`ResultGraph`]. Steps never overlap, and an empty frontier
//! still counts as a step.

use crate::error::{Result, ScanError};
use crate::expander::{FrontierExpander, ProgressCallback};
use crate::resolver::{NodeResolver, resolve_guarded};
use crate::result::{TransactionNode, TxId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-step diagnostics passed to a [`StepCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: usize,
    pub frontier: Vec<TxId>,
    pub discovered: usize,
    pub degraded: usize,
}

pub type StepCallback = Arc<dyn Fn(&StepReport) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Seeded,
    Stepping(usize),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkSettings {
    /// Total steps including the seed step. Must be positive.
    pub steps: usize,
    pub max_workers: usize,
    /// Skip ids that were already resolved earlier in the walk.
    pub dedupe: bool,
}

impl Default for WalkSettings {
    fn default() -> Self {
        Self {
            steps: 7,
            max_workers: 13,
            dedupe: false,
        }
    }
}

impl WalkSettings {
    pub fn validate(&self) -> Result<()> {
        if self.steps == 0 {
            return Err(ScanError::InvalidConfig(
                "steps must be greater than 0".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(ScanError::InvalidConfig(
                "max workers must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Nodes collected by a walk, appended one step at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultGraph {
    nodes: Vec<TransactionNode>,
    step_sizes: Vec<usize>,
}

impl ResultGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from already collected steps, seed step first.
    pub fn from_steps(steps: Vec<Vec<TransactionNode>>) -> Self {
        let mut graph = Self::new();
        for nodes in steps {
            graph.append_step(nodes);
        }
        graph
    }

    pub(crate) fn append_step(&mut self, nodes: Vec<TransactionNode>) {
        self.step_sizes.push(nodes.len());
        self.nodes.extend(nodes);
    }

    pub fn nodes(&self) -> &[TransactionNode] {
        &self.nodes
    }

    /// Number of nodes contributed by each step, seed step first.
    pub fn step_sizes(&self) -> &[usize] {
        &self.step_sizes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Directed edges from each node to each of its outputs.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().flat_map(|node| {
            node.outputs()
                .iter()
                .map(move |output| (node.id(), output.as_str()))
        })
    }
}

pub struct TaintWalk {
    resolver: Arc<dyn NodeResolver>,
    settings: WalkSettings,
    progress_callback: Option<ProgressCallback>,
    step_callback: Option<StepCallback>,
}

impl TaintWalk {
    pub fn new(resolver: Arc<dyn NodeResolver>, settings: WalkSettings) -> Self {
        Self {
            resolver,
            settings,
            progress_callback: None,
            step_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_step_callback(mut self, callback: StepCallback) -> Self {
        self.step_callback = Some(callback);
        self
    }

    /// Walk from `seed` for the configured number of steps.
    ///
    /// Fails only on invalid settings (checked before any request) or a
    /// crashed worker task. Unreachable pages and panicking resolutions show
    /// up as empty nodes.
    pub async fn run(&self, seed: &str) -> Result<ResultGraph> {
        self.settings.validate()?;
        info!(
            "Starting taint walk from {} ({} steps, {} workers)",
            seed, self.settings.steps, self.settings.max_workers
        );

        let mut expander = FrontierExpander::new(self.resolver.clone(), self.settings.max_workers);
        if let Some(ref callback) = self.progress_callback {
            expander = expander.with_progress_callback(callback.clone());
        }

        let mut graph = ResultGraph::new();
        let mut visited: HashSet<TxId> = HashSet::new();
        let mut frontier: Vec<TxId> = Vec::new();
        let mut state = WalkState::Seeded;

        loop {
            state = match state {
                WalkState::Seeded => {
                    if let Some(ref callback) = self.progress_callback {
                        callback(0, seed.to_string());
                    }
                    let resolution = resolve_guarded(self.resolver.as_ref(), seed).await;
                    let degraded = usize::from(resolution.is_degraded());
                    let node = resolution.into_node();

                    visited.insert(seed.to_string());
                    visited.insert(node.id().to_string());
                    frontier = node.outputs().to_vec();

                    self.report(StepReport {
                        step: 0,
                        frontier: vec![seed.to_string()],
                        discovered: 1,
                        degraded,
                    });
                    graph.append_step(vec![node]);
                    next_state(1, self.settings.steps)
                }
                WalkState::Stepping(step) => {
                    let current = std::mem::take(&mut frontier);
                    let current = if self.settings.dedupe {
                        dedupe_frontier(current, &mut visited)
                    } else {
                        current
                    };

                    let expansion = expander.expand(current.clone()).await?;
                    self.report(StepReport {
                        step,
                        frontier: current,
                        discovered: expansion.nodes.len(),
                        degraded: expansion.degraded,
                    });

                    frontier = expansion.next_frontier;
                    graph.append_step(expansion.nodes);
                    next_state(step + 1, self.settings.steps)
                }
                WalkState::Done => break,
            };
        }

        info!(
            "Taint walk complete. Found {} nodes in {} steps",
            graph.len(),
            self.settings.steps
        );
        Ok(graph)
    }

    fn report(&self, report: StepReport) {
        info!(
            "Step {}/{}: {} nodes found ({} degraded) from a frontier of {}",
            report.step + 1,
            self.settings.steps,
            report.discovered,
            report.degraded,
            report.frontier.len()
        );
        if let Some(ref callback) = self.step_callback {
            callback(&report);
        }
    }
}

fn next_state(step: usize, steps: usize) -> WalkState {
    if step < steps {
        WalkState::Stepping(step)
    } else {
        WalkState::Done
    }
}

/// Drop ids resolved earlier in the walk, and repeats within the frontier.
fn dedupe_frontier(frontier: Vec<TxId>, visited: &mut HashSet<TxId>) -> Vec<TxId> {
    let before = frontier.len();
    let kept: Vec<TxId> = frontier
        .into_iter()
        .filter(|id| visited.insert(id.clone()))
        .collect();
    debug!("Deduplicated frontier from {} to {}", before, kept.len());
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticResolver;
    use std::sync::Mutex;

    fn settings(steps: usize, max_workers: usize) -> WalkSettings {
        WalkSettings {
            steps,
            max_workers,
            dedupe: false,
        }
    }

    #[tokio::test]
    async fn test_zero_steps_rejected_before_any_request() {
        let resolver = Arc::new(StaticResolver::new().with_outputs("seed", &["a"]));
        let walk = TaintWalk::new(resolver.clone(), settings(0, 4));

        let result = walk.run("seed").await;

        assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
        assert!(resolver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let resolver = Arc::new(StaticResolver::new());
        let walk = TaintWalk::new(resolver.clone(), settings(3, 0));

        assert!(matches!(walk.run("seed").await, Err(ScanError::InvalidConfig(_))));
        assert!(resolver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_step_is_seed_only() {
        let resolver = Arc::new(StaticResolver::new().with_outputs("seed", &["a", "b"]));
        let walk = TaintWalk::new(resolver.clone(), settings(1, 4));

        let graph = walk.run("seed").await.unwrap();

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.nodes()[0].id(), "seed");
        assert_eq!(resolver.calls(), ["seed"]);
    }

    #[tokio::test]
    async fn test_two_steps_expand_seed_outputs_once() {
        let resolver = Arc::new(
            StaticResolver::new()
                .with_outputs("seed", &["a", "b"])
                .with_outputs("a", &["c"])
                .with_outputs("b", &["d"]),
        );
        let frontiers: Arc<Mutex<Vec<(usize, Vec<TxId>)>>> = Arc::new(Mutex::new(Vec::new()));
        let frontiers_clone = frontiers.clone();

        let walk = TaintWalk::new(resolver.clone(), settings(2, 4)).with_step_callback(Arc::new(
            move |report: &StepReport| {
                frontiers_clone
                    .lock()
                    .unwrap()
                    .push((report.step, report.frontier.clone()));
            },
        ));

        let graph = walk.run("seed").await.unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.step_sizes(), [1, 2]);
        assert_eq!(resolver.calls_for("a"), 1);
        assert_eq!(resolver.calls_for("b"), 1);
        assert_eq!(resolver.calls_for("c"), 0);
        assert_eq!(resolver.calls().len(), 3);

        let frontiers = frontiers.lock().unwrap();
        let expanded: Vec<_> = frontiers.iter().filter(|(step, _)| *step > 0).collect();
        assert_eq!(expanded.len(), 1);
        let mut first_frontier = expanded[0].1.clone();
        first_frontier.sort();
        assert_eq!(first_frontier, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_frontier_still_runs_all_steps() {
        let resolver = Arc::new(StaticResolver::new().with_outputs("seed", &["a"]));
        let steps_seen = Arc::new(Mutex::new(Vec::new()));
        let steps_clone = steps_seen.clone();

        let walk = TaintWalk::new(resolver.clone(), settings(5, 4)).with_step_callback(Arc::new(
            move |report: &StepReport| steps_clone.lock().unwrap().push(report.step),
        ));

        let graph = walk.run("seed").await.unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.step_sizes(), [1, 1, 0, 0, 0]);
        assert_eq!(*steps_seen.lock().unwrap(), [0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_failed_seed_still_returns_graph() {
        let resolver = Arc::new(
            StaticResolver::new()
                .with_outputs("seed", &["a"])
                .with_failure("seed"),
        );
        let walk = TaintWalk::new(resolver, settings(3, 2));

        let graph = walk.run("seed").await.unwrap();

        assert_eq!(graph.len(), 1);
        assert!(graph.nodes()[0].is_empty());
    }

    #[tokio::test]
    async fn test_panicking_resolution_keeps_the_walk_going() {
        let resolver = Arc::new(
            StaticResolver::new()
                .with_outputs("seed", &["a", "b"])
                .with_outputs("a", &["c"])
                .with_outputs("b", &["d"])
                .with_panic("b"),
        );
        let walk = TaintWalk::new(resolver.clone(), settings(3, 2));

        let graph = walk.run("seed").await.unwrap();

        assert_eq!(graph.step_sizes(), [1, 2, 1]);
        let b = graph.nodes().iter().find(|n| n.id() == "b").unwrap();
        assert!(b.is_empty());
        assert_eq!(resolver.calls_for("c"), 1);
        assert_eq!(resolver.calls_for("d"), 0);
    }

    #[tokio::test]
    async fn test_panicking_seed_still_returns_graph() {
        let resolver = Arc::new(StaticResolver::new().with_panic("seed"));
        let walk = TaintWalk::new(resolver, settings(3, 2));

        let graph = walk.run("seed").await.unwrap();

        assert_eq!(graph.step_sizes(), [1, 0, 0]);
        assert!(graph.nodes()[0].is_empty());
    }

    #[tokio::test]
    async fn test_revisits_without_dedupe() {
        // seed -> a, b; a -> c; b -> c; c -> a
        let resolver = Arc::new(
            StaticResolver::new()
                .with_outputs("seed", &["a", "b"])
                .with_outputs("a", &["c"])
                .with_outputs("b", &["c"])
                .with_outputs("c", &["a"]),
        );
        let walk = TaintWalk::new(resolver.clone(), settings(4, 4));

        let graph = walk.run("seed").await.unwrap();

        assert_eq!(graph.step_sizes(), [1, 2, 2, 2]);
        assert_eq!(resolver.calls_for("c"), 2);
        assert_eq!(resolver.calls_for("a"), 3);
    }

    #[tokio::test]
    async fn test_dedupe_skips_visited() {
        let resolver = Arc::new(
            StaticResolver::new()
                .with_outputs("seed", &["a", "b"])
                .with_outputs("a", &["c"])
                .with_outputs("b", &["c"])
                .with_outputs("c", &["a", "seed"]),
        );
        let walk = TaintWalk::new(
            resolver.clone(),
            WalkSettings {
                steps: 4,
                max_workers: 4,
                dedupe: true,
            },
        );

        let graph = walk.run("seed").await.unwrap();

        assert_eq!(graph.step_sizes(), [1, 2, 1, 0]);
        assert_eq!(resolver.calls_for("c"), 1);
        assert_eq!(resolver.calls_for("a"), 1);
        assert_eq!(resolver.calls_for("seed"), 1);
    }

    #[tokio::test]
    async fn test_graph_bounded_by_frontier_sizes() {
        let resolver = Arc::new(
            StaticResolver::new()
                .with_outputs("seed", &["a", "b", "c"])
                .with_outputs("a", &["d", "e"])
                .with_outputs("b", &["f"])
                .with_outputs("d", &["g"]),
        );
        let frontier_total = Arc::new(Mutex::new(0usize));
        let total_clone = frontier_total.clone();

        let walk = TaintWalk::new(resolver, settings(4, 3)).with_step_callback(Arc::new(
            move |report: &StepReport| *total_clone.lock().unwrap() += report.frontier.len(),
        ));

        let graph = walk.run("seed").await.unwrap();

        assert!(graph.len() >= 1);
        assert!(graph.len() <= *frontier_total.lock().unwrap());
        assert_eq!(graph.len(), 1 + 3 + 3 + 1);
    }

    #[test]
    fn test_edges() {
        let mut graph = ResultGraph::new();
        graph.append_step(vec![TransactionNode::new(
            "s".to_string(),
            vec![],
            vec!["a".to_string(), "b".to_string()],
        )]);
        graph.append_step(vec![TransactionNode::new(
            "a".to_string(),
            vec!["s".to_string()],
            vec!["c".to_string()],
        )]);

        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges, [("s", "a"), ("s", "b"), ("a", "c")]);
    }
}
