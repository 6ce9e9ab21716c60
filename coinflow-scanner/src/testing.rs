//! In-memory resolver for exercising the expander and the walk.

use crate::resolver::NodeResolver;
use crate::result::{Resolution, TransactionNode};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct StaticResolver {
    outputs: HashMap<String, Vec<String>>,
    failing: Vec<String>,
    panicking: Vec<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outputs(mut self, id: &str, outputs: &[&str]) -> Self {
        self.outputs
            .insert(id.to_string(), outputs.iter().map(|o| o.to_string()).collect());
        self
    }

    pub fn with_failure(mut self, id: &str) -> Self {
        self.failing.push(id.to_string());
        self
    }

    pub fn with_panic(mut self, id: &str) -> Self {
        self.panicking.push(id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.calls().iter().filter(|call| *call == id).count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeResolver for StaticResolver {
    async fn resolve(&self, id: &str) -> Resolution {
        self.calls.lock().unwrap().push(id.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.iter().any(|panicking| panicking == id) {
            panic!("resolver blew up on {}", id);
        }
        if self.failing.iter().any(|failing| failing == id) {
            return Resolution::degraded(id, "simulated network failure");
        }

        let outputs = self.outputs.get(id).cloned().unwrap_or_default();
        Resolution::Resolved(TransactionNode::new(id.to_string(), Vec::new(), outputs))
    }
}
