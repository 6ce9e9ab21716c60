use chrono::{DateTime, Utc};
use coinflow_scanner::error::Result;
use coinflow_scanner::{
    ExplorerResolver, NodeResolver, ResultGraph, StepReport, TaintWalk, WalkSettings,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;
use uuid::Uuid;

use crate::config::AppConfig;

/// Options for configuring a taint walk run
pub struct TaintOptions {
    pub config: AppConfig,
    pub show_progress_bars: bool,
}

/// Callback for reporting each completed step
pub type TaintProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// A finished walk together with the metadata the reports print.
#[derive(Debug, Clone)]
pub struct TaintRun {
    pub run_id: String,
    pub seed: String,
    pub base_url: String,
    pub settings: WalkSettings,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub degraded: usize,
    pub graph: ResultGraph,
}

impl TaintRun {
    pub fn duration_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Execute a taint walk against the explorer configured in `options`.
pub async fn execute_taint_walk(
    options: TaintOptions,
    progress_callback: Option<TaintProgressCallback>,
) -> Result<TaintRun> {
    options
        .config
        .validate()
        .map_err(|e| coinflow_scanner::ScanError::InvalidConfig(e.to_string()))?;
    let resolver = Arc::new(ExplorerResolver::new(options.config.explorer_config()));
    execute_taint_walk_with(resolver, options, progress_callback).await
}

/// Execute a taint walk with any resolver.
pub async fn execute_taint_walk_with(
    resolver: Arc<dyn NodeResolver>,
    options: TaintOptions,
    progress_callback: Option<TaintProgressCallback>,
) -> Result<TaintRun> {
    let TaintOptions {
        config,
        show_progress_bars,
    } = options;
    let settings = config.walk_settings();
    let started_at = Utc::now();

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Resolving seed {}...", config.seed_id));
        Some(Arc::new(pb))
    } else {
        None
    };

    let resolved_count = Arc::new(AtomicUsize::new(0));
    let degraded_count = Arc::new(AtomicUsize::new(0));

    let internal_progress_callback: coinflow_scanner::ProgressCallback =
        match progress_bar.clone() {
            Some(pb) => {
                let count = resolved_count.clone();
                Arc::new(move |_worker_id: usize, id: String| {
                    let count = count.fetch_add(1, Ordering::Relaxed) + 1;
                    pb.set_message(format!("Resolving {}... {} transactions requested", id, count));
                    pb.tick();
                })
            }
            None => Arc::new(|_worker_id: usize, _id: String| {}),
        };

    let step_callback: coinflow_scanner::StepCallback = {
        let degraded = degraded_count.clone();
        let steps = settings.steps;
        Arc::new(move |report: &StepReport| {
            degraded.fetch_add(report.degraded, Ordering::Relaxed);
            if let Some(ref callback) = progress_callback {
                callback(format!(
                    "Step {}/{}: {} nodes from {} ids ({} degraded)",
                    report.step + 1,
                    steps,
                    report.discovered,
                    report.frontier.len(),
                    report.degraded
                ));
            }
        })
    };

    let walk = TaintWalk::new(resolver, settings.clone())
        .with_progress_callback(internal_progress_callback)
        .with_step_callback(step_callback);

    let result = walk.run(&config.seed_id).await;

    if let Some(ref pb) = progress_bar {
        match result {
            Ok(ref graph) => pb.finish_with_message(format!(
                "Taint walk complete! {} nodes in {} steps",
                graph.len(),
                graph.step_sizes().len()
            )),
            Err(ref e) => pb.abandon_with_message(format!("Taint walk failed: {}", e)),
        }
    }

    let graph = result?;
    let run_id = Uuid::new_v4().to_string();
    info!("Run {}: {} nodes from seed {}", run_id, graph.len(), config.seed_id);

    Ok(TaintRun {
        run_id,
        seed: config.seed_id,
        base_url: config.base_url,
        settings,
        started_at,
        finished_at: Utc::now(),
        degraded: degraded_count.load(Ordering::Relaxed),
        graph,
    })
}
