use crate::error::Result;
use crate::resolver::{NodeResolver, resolve_guarded};
use crate::result::{TransactionNode, TxId};
use crate::workers::{effective_concurrency, run_bounded};
use std::sync::Arc;
use tracing::debug;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Nodes resolved for one frontier and the frontier they lead to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub nodes: Vec<TransactionNode>,
    /// Outputs of every resolved node, in completion order, duplicates kept.
    pub next_frontier: Vec<TxId>,
    /// How many of `nodes` are empty stand-ins for failed resolutions.
    pub degraded: usize,
}

/// Resolves a whole frontier concurrently.
pub struct FrontierExpander {
    resolver: Arc<dyn NodeResolver>,
    max_workers: usize,
    progress_callback: Option<ProgressCallback>,
}

impl FrontierExpander {
    pub fn new(resolver: Arc<dyn NodeResolver>, max_workers: usize) -> Self {
        Self {
            resolver,
            max_workers,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn concurrency_for(&self, frontier_len: usize) -> usize {
        effective_concurrency(self.max_workers, frontier_len)
    }

    /// Resolve every id of `frontier` exactly once.
    ///
    /// A fresh worker pool of `min(max_workers, |frontier|, 7)` workers is
    /// created for the call; an empty frontier returns without one.
    pub async fn expand(&self, frontier: Vec<TxId>) -> Result<Expansion> {
        if frontier.is_empty() {
            return Ok(Expansion::default());
        }

        let concurrency = self.concurrency_for(frontier.len());
        debug!(
            "Expanding {} transactions with {} workers",
            frontier.len(),
            concurrency
        );

        let resolver = self.resolver.clone();
        let progress = self.progress_callback.clone();
        let resolutions = run_bounded(frontier, concurrency, move |worker_id, id: TxId| {
            let resolver = resolver.clone();
            let progress = progress.clone();
            async move {
                if let Some(ref callback) = progress {
                    callback(worker_id, id.clone());
                }
                resolve_guarded(resolver.as_ref(), &id).await
            }
        })
        .await?;

        let mut expansion = Expansion::default();
        for resolution in resolutions {
            if resolution.is_degraded() {
                expansion.degraded += 1;
            }
            let node = resolution.into_node();
            expansion.next_frontier.extend_from_slice(node.outputs());
            expansion.nodes.push(node);
        }

        Ok(expansion)
    }
}
