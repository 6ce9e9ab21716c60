use crate::error::{Result, ScanError};
use crate::identity::ClientIdentity;
use crate::parse::parse_transaction_page;
use crate::result::{Resolution, TransactionNode};
use crate::session::ExplorerSession;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://www.walletexplorer.com";

/// Coinbase transaction of an early Eligius block, as accepted by the explorer's search.
pub const ELIGIUS_COINBASE_TX: &str = "c82c10925cc3890f1299";

/// Turns a transaction id into a node. Implementations never fail: problems
/// are reported as [`Resolution::Degraded`].
#[async_trait]
pub trait NodeResolver: Send + Sync {
    async fn resolve(&self, id: &str) -> Resolution;
}

/// Resolve `id`, degrading it to the empty node if the resolver panics.
pub async fn resolve_guarded(resolver: &dyn NodeResolver, id: &str) -> Resolution {
    match AssertUnwindSafe(resolver.resolve(id)).catch_unwind().await {
        Ok(resolution) => resolution,
        Err(payload) => {
            let cause = panic_message(payload.as_ref());
            warn!("Resolver panicked on {}: {}", id, cause);
            Resolution::degraded(id, format!("resolver panicked: {}", cause))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub base_url: String,
    /// Id resolved through the search form instead of `/txid/{id}`.
    pub seed_id: String,
    pub request_timeout: Duration,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            seed_id: ELIGIUS_COINBASE_TX.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Resolves transactions by scraping the explorer, one fresh session per call.
pub struct ExplorerResolver {
    config: ExplorerConfig,
}

impl ExplorerResolver {
    pub fn new(config: ExplorerConfig) -> Self {
        Self { config }
    }

    pub fn transaction_url(&self, id: &str) -> String {
        format!("{}/txid/{}", self.config.base_url.trim_end_matches('/'), id)
    }

    async fn fetch_node(&self, id: &str) -> Result<TransactionNode> {
        let session = ExplorerSession::new(
            ClientIdentity::random(),
            self.config.request_timeout,
            None,
        )?;

        let seed = id == self.config.seed_id;
        let page = if seed {
            debug!("Resolving seed {} through the search form", id);
            session.submit_search(&self.config.base_url, id).await?
        } else {
            session.fetch_ok(&self.transaction_url(id)).await?
        };

        parse_transaction_page(&page.body, id, seed)
    }
}

#[async_trait]
impl NodeResolver for ExplorerResolver {
    async fn resolve(&self, id: &str) -> Resolution {
        let timeout = self.config.request_timeout;

        let outcome = match tokio::time::timeout(timeout, self.fetch_node(id)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ScanError::Timeout(timeout.as_millis())),
        };

        match outcome {
            Ok(node) => {
                debug!(
                    "Resolved {} ({} inputs, {} outputs)",
                    node.id(),
                    node.inputs().len(),
                    node.outputs().len()
                );
                Resolution::Resolved(node)
            }
            Err(e) => {
                warn!("Degrading {} to an empty node: {}", id, e);
                Resolution::degraded(id, e.to_string())
            }
        }
    }
}
