use chrono::{DateTime, Utc};
use coinflow_scanner::error::Result;
use coinflow_scanner::pools::PoolProgressCallback;
use coinflow_scanner::{MiningPool, PoolAddressResolver, PoolAttribution, ScanError, default_pools};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::config::{AppConfig, ConfigError};

/// Options for resolving pool addresses
pub struct PoolOptions {
    pub config: AppConfig,
    pub pools: Vec<MiningPool>,
    pub show_progress_bars: bool,
}

/// Callback for reporting per-pool progress
pub type AttributionProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct AttributionRun {
    pub run_id: String,
    pub base_url: String,
    pub pools: Vec<MiningPool>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub attribution: PoolAttribution,
}

/// Pick pools from the default list by name, case-insensitively.
///
/// An empty `names` selects every default pool.
pub fn select_pools(names: &[String]) -> std::result::Result<Vec<MiningPool>, ConfigError> {
    let known = default_pools();
    if names.is_empty() {
        return Ok(known);
    }

    names
        .iter()
        .map(|name| {
            known
                .iter()
                .find(|pool| pool.name.eq_ignore_ascii_case(name))
                .cloned()
                .ok_or_else(|| {
                    let available: Vec<&str> = known.iter().map(|p| p.name.as_str()).collect();
                    ConfigError::Invalid(format!(
                        "unknown pool '{}' (known pools: {})",
                        name,
                        available.join(", ")
                    ))
                })
        })
        .collect()
}

/// Resolve the addresses of every pool in `options`.
pub async fn execute_pool_resolution(
    options: PoolOptions,
    progress_callback: Option<AttributionProgressCallback>,
) -> Result<AttributionRun> {
    let PoolOptions {
        config,
        pools,
        show_progress_bars,
    } = options;
    config
        .validate()
        .map_err(|e| ScanError::InvalidConfig(e.to_string()))?;
    let started_at = Utc::now();

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Fetching pool address listings...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let page_callback: PoolProgressCallback = match progress_bar.clone() {
        Some(pb) => Arc::new(move |pool: &str, page: usize, pages: usize| {
            pb.set_message(format!("{}: page {} of {}", pool, page, pages));
            pb.tick();
        }),
        None => Arc::new(|_pool: &str, _page: usize, _pages: usize| {}),
    };

    let resolver =
        PoolAddressResolver::new(config.pool_resolver_config()).with_progress_callback(page_callback);

    let mut attribution = PoolAttribution::new();
    for (idx, pool) in pools.iter().enumerate() {
        if let Some(ref callback) = progress_callback {
            callback(format!(
                "Resolving pool {}/{}: {}",
                idx + 1,
                pools.len(),
                pool.name
            ));
        }

        match resolver.resolve_pool(pool).await {
            Ok(addresses) => {
                if let Some(ref callback) = progress_callback {
                    callback(format!("{}: {} addresses", pool.name, addresses.len()));
                }
                attribution.insert_pool(&pool.name, addresses);
            }
            Err(e) => {
                warn!("Pool resolution stopped at {}: {}", pool.name, e);
                if let Some(ref pb) = progress_bar {
                    pb.abandon_with_message(format!("Failed to resolve {}: {}", pool.name, e));
                }
                return Err(e);
            }
        }
    }

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Pool resolution complete! {} addresses across {} pools",
            attribution.len(),
            pools.len()
        ));
    }

    Ok(AttributionRun {
        run_id: Uuid::new_v4().to_string(),
        base_url: config.base_url,
        pools,
        started_at,
        finished_at: Utc::now(),
        attribution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_all_by_default() {
        assert_eq!(select_pools(&[]).unwrap().len(), 4);
    }

    #[test]
    fn test_select_is_case_insensitive() {
        let pools = select_pools(&["deepbit".to_string(), "ELIGIUS".to_string()]).unwrap();
        assert_eq!(pools[0].wallet, "DeepBit.net");
        assert_eq!(pools[1].wallet, "Eligius.st");
    }

    #[test]
    fn test_unknown_pool_is_rejected() {
        let err = select_pools(&["Slush".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Slush"));
    }
}
