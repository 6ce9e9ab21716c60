//! Application configuration.
//!
//! Every field has a default so an empty JSON object (or no file at all) is a
//! valid configuration. Command line flags are applied on top by the binary.

use coinflow_scanner::pools::DEFAULT_MAX_PAGES;
use coinflow_scanner::resolver::{DEFAULT_BASE_URL, ELIGIUS_COINBASE_TX};
use coinflow_scanner::{ExplorerConfig, PoolResolverConfig, RetryPolicy, WalkSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub seed_id: String,
    pub max_workers: usize,
    pub steps: usize,
    pub request_timeout_secs: u64,
    /// Skip ids already resolved earlier in the walk.
    pub dedupe: bool,
    /// Largest page count a pool listing may announce.
    pub max_pages: usize,
    pub proxies: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            seed_id: ELIGIUS_COINBASE_TX.to_string(),
            max_workers: 13,
            steps: 7,
            request_timeout_secs: 30,
            dedupe: false,
            max_pages: DEFAULT_MAX_PAGES,
            proxies: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Check the values that would otherwise only fail once the first request
    /// goes out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps == 0 {
            return Err(ConfigError::Invalid("steps must be at least 1".to_string()));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid(
                "max_pages must be at least 1".to_string(),
            ));
        }
        if self.seed_id.trim().is_empty() {
            return Err(ConfigError::Invalid("seed_id must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }

        let base = url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url {}: {}", self.base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http or https, got {}",
                base.scheme()
            )));
        }

        for proxy in &self.proxies {
            url::Url::parse(proxy)
                .map_err(|e| ConfigError::Invalid(format!("proxy {}: {}", proxy, e)))?;
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn walk_settings(&self) -> WalkSettings {
        WalkSettings {
            steps: self.steps,
            max_workers: self.max_workers,
            dedupe: self.dedupe,
        }
    }

    pub fn explorer_config(&self) -> ExplorerConfig {
        ExplorerConfig {
            base_url: self.base_url.clone(),
            seed_id: self.seed_id.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    pub fn pool_resolver_config(&self) -> PoolResolverConfig {
        PoolResolverConfig {
            base_url: self.base_url.clone(),
            max_workers: self.max_workers,
            request_timeout: self.request_timeout(),
            retry: self.retry.clone(),
            max_pages: self.max_pages,
            proxies: self.proxies.clone(),
        }
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load `path` when given, otherwise fall back to the defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => Ok(AppConfig::default()),
    }
}
