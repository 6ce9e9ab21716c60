//! Short-lived bounded worker pools.
//!
//! Each call to [`run_bounded`] spawns its own set of workers that drain a
//! shared queue and exits once the queue is empty; nothing is shared between
//! calls.

use crate::error::Result;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Upper bound on concurrent requests against the explorer, whatever the
/// configured worker count.
pub const MAX_CONCURRENCY: usize = 7;

/// Workers to use for `items` pending jobs: `min(max_workers, items, MAX_CONCURRENCY)`.
pub fn effective_concurrency(max_workers: usize, items: usize) -> usize {
    max_workers.min(items).min(MAX_CONCURRENCY)
}

/// Run `task` once for every item using `concurrency` workers.
///
/// Items are pulled lazily from the iterator, so a range of pending pages is
/// never materialized up front. Results come back in completion order. An
/// empty `items` returns immediately without spawning anything.
pub async fn run_bounded<I, T, R, F, Fut>(items: I, concurrency: usize, task: F) -> Result<Vec<R>>
where
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator + Send + 'static,
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let items = items.into_iter();
    if items.len() == 0 {
        return Ok(Vec::new());
    }

    let workers = concurrency.clamp(1, items.len());
    let queue = Arc::new(Mutex::new(items));
    let task = Arc::new(task);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let queue = queue.clone();
        let task = task.clone();
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            debug!("Worker {} started", worker_id);
            loop {
                let item = queue.lock().await.next();
                let Some(item) = item else {
                    break;
                };

                let output = task(worker_id, item).await;
                if tx.send(output).is_err() {
                    break;
                }
            }
            debug!("Worker {} finished", worker_id);
        }));
    }
    drop(tx);

    let mut results = Vec::new();
    while let Some(output) = rx.recv().await {
        results.push(output);
    }

    for joined in join_all(handles).await {
        joined?;
    }

    Ok(results)
}
