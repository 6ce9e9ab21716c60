use crate::error::{Result, ScanError};
use crate::identity::ClientIdentity;
use crate::parse::{parse_page_count, parse_wallet_addresses};
use crate::resolver::DEFAULT_BASE_URL;
use crate::retry::{RetryPolicy, is_unsuccessful};
use crate::session::ExplorerSession;
use crate::workers::{effective_concurrency, run_bounded};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A mining pool and the name of its wallet on the explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningPool {
    pub name: String,
    pub wallet: String,
}

impl MiningPool {
    pub fn new(name: impl Into<String>, wallet: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wallet: wallet.into(),
        }
    }
}

/// The four pools tracked by default.
pub fn default_pools() -> Vec<MiningPool> {
    vec![
        MiningPool::new("Eligius", "Eligius.st"),
        MiningPool::new("DeepBit", "DeepBit.net"),
        MiningPool::new("BitMinter", "BitMinter.com"),
        MiningPool::new("BTCGuild", "BTCGuild.com"),
    ]
}

/// Address to pool mapping. When an address is listed under two pools the
/// later pool wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAttribution {
    by_address: HashMap<String, String>,
    /// Addresses each pool's listing returned, before later pools took any over.
    listed: BTreeMap<String, usize>,
}

impl PoolAttribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pool(&mut self, pool: &str, addresses: Vec<String>) {
        self.listed.insert(pool.to_string(), addresses.len());
        for address in addresses {
            self.by_address.insert(address, pool.to_string());
        }
    }

    pub fn pool_of(&self, address: &str) -> Option<&str> {
        self.by_address.get(address).map(String::as_str)
    }

    /// Addresses attributed to each inserted pool after the merge. Sums to
    /// [`len`](Self::len); a pool that lost every address counts 0.
    pub fn addresses_per_pool(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> =
            self.listed.keys().map(|pool| (pool.clone(), 0)).collect();
        for pool in self.by_address.values() {
            *counts.entry(pool.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Raw listing length per pool, duplicates across pools included.
    pub fn listed_per_pool(&self) -> &BTreeMap<String, usize> {
        &self.listed
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    /// `(address, pool)` pairs sorted by pool, then address.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .by_address
            .iter()
            .map(|(address, pool)| (address.as_str(), pool.as_str()))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)));
        entries
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolResolverConfig {
    pub base_url: String,
    pub max_workers: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Largest page count accepted from a listing's "Page 1 / N" marker.
    pub max_pages: usize,
    /// Proxies picked at random when a session is rotated.
    pub proxies: Vec<String>,
}

impl Default for PoolResolverConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_workers: 13,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            max_pages: DEFAULT_MAX_PAGES,
            proxies: Vec::new(),
        }
    }
}

pub const DEFAULT_MAX_PAGES: usize = 5000;

pub type PoolProgressCallback = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;

/// Collects the addresses listed for mining pools, page by page.
#[derive(Clone)]
pub struct PoolAddressResolver {
    config: Arc<PoolResolverConfig>,
    progress_callback: Option<PoolProgressCallback>,
}

impl PoolAddressResolver {
    pub fn new(config: PoolResolverConfig) -> Self {
        Self {
            config: Arc::new(config),
            progress_callback: None,
        }
    }

    /// Called with `(pool, page, pages)` after each listing page is parsed.
    pub fn with_progress_callback(mut self, callback: PoolProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn listing_url(&self, pool: &MiningPool) -> String {
        format!(
            "{}/wallet/{}/addresses",
            self.config.base_url.trim_end_matches('/'),
            pool.wallet
        )
    }

    pub fn page_url(listing: &str, page: usize) -> String {
        if page == 1 {
            listing.to_string()
        } else {
            format!("{}?page={}", listing, page)
        }
    }

    /// Every address listed for `pool`, across all of its pages.
    pub async fn resolve_pool(&self, pool: &MiningPool) -> Result<Vec<String>> {
        if self.config.max_workers == 0 {
            return Err(ScanError::InvalidConfig(
                "max workers must be greater than 0".to_string(),
            ));
        }

        let listing = self.listing_url(pool);
        let first_page = self.fetch_with_retry(&listing).await?;
        let pages = parse_page_count(&first_page).unwrap_or(1);
        if pages > self.config.max_pages {
            return Err(ScanError::ParseError(format!(
                "{} lists {} address pages, more than the limit of {}",
                pool.name, pages, self.config.max_pages
            )));
        }
        info!("{}: {} address pages", pool.name, pages);

        let mut addresses = parse_wallet_addresses(&first_page);
        self.report(&pool.name, 1, pages);

        let remaining = (1..pages).map(|page| page + 1);
        let concurrency = effective_concurrency(self.config.max_workers, remaining.len());

        let resolver = self.clone();
        let pool_name = pool.name.clone();
        let page_results = run_bounded(remaining, concurrency, move |worker_id, page| {
            let resolver = resolver.clone();
            let url = Self::page_url(&listing, page);
            let pool_name = pool_name.clone();
            async move {
                debug!("[Worker {}] {} page {}", worker_id, pool_name, page);
                let body = resolver.fetch_with_retry(&url).await?;
                resolver.report(&pool_name, page, pages);
                Ok::<_, ScanError>(parse_wallet_addresses(&body))
            }
        })
        .await?;

        for page_addresses in page_results {
            addresses.extend(page_addresses?);
        }

        info!("{}: found {} addresses", pool.name, addresses.len());
        Ok(addresses)
    }

    /// Fetch a page, retrying refused or failed requests under the retry policy.
    pub async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let proxy = self.pick_proxy();
        let mut session = self.session(ClientIdentity::random(), proxy.as_deref())?;
        let mut last_status = 0;

        for attempt in 1..=max_attempts {
            match session.fetch(url).await {
                Ok(page) if !is_unsuccessful(page.status_code, &page.body) => {
                    return Ok(page.body);
                }
                Ok(page) => {
                    last_status = page.status_code;
                    warn!(
                        "Unsuccessful response for {} in attempt {}/{} (status {})",
                        url, attempt, max_attempts, page.status_code
                    );
                }
                Err(e) => {
                    warn!(
                        "Request for {} failed in attempt {}/{}: {}",
                        url, attempt, max_attempts, e
                    );
                }
            }

            if attempt == max_attempts {
                break;
            }

            tokio::time::sleep(policy.backoff(attempt)).await;
            if policy.rotate_identity {
                session = self.rotated_session()?;
            }
        }

        Err(ScanError::RequestFailed {
            url: url.to_string(),
            status: last_status,
            attempts: max_attempts,
        })
    }

    fn rotated_session(&self) -> Result<ExplorerSession> {
        let identity = ClientIdentity::random_on_site(&self.config.base_url);
        let proxy = self.pick_proxy();
        debug!(
            "Rotating session identity (proxy: {})",
            proxy.as_deref().unwrap_or("none")
        );
        self.session(identity, proxy.as_deref())
    }

    fn pick_proxy(&self) -> Option<String> {
        self.config.proxies.choose(&mut rand::thread_rng()).cloned()
    }

    fn session(&self, identity: ClientIdentity, proxy: Option<&str>) -> Result<ExplorerSession> {
        ExplorerSession::new(identity, self.config.request_timeout, proxy)
    }

    fn report(&self, pool: &str, page: usize, pages: usize) {
        if let Some(ref callback) = self.progress_callback {
            callback(pool, page, pages);
        }
    }
}
