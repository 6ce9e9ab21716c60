pub mod attribution;
pub mod config;
pub mod report;
pub mod taint;

pub use attribution::{AttributionRun, PoolOptions, execute_pool_resolution, select_pools};
pub use config::{AppConfig, ConfigError, load_config, load_or_default};
pub use report::{ReportError, ReportFormat, generate_pool_report, generate_walk_report, save_report};
pub use taint::{TaintOptions, TaintRun, execute_taint_walk, execute_taint_walk_with};
