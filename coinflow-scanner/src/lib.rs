pub mod error;
pub mod expander;
pub mod identity;
pub mod parse;
pub mod pools;
pub mod resolver;
pub mod result;
pub mod retry;
pub mod session;
pub mod walk;
pub mod workers;

#[cfg(test)]
mod testing;

pub use error::ScanError;
pub use expander::{Expansion, FrontierExpander, ProgressCallback};
pub use pools::{MiningPool, PoolAddressResolver, PoolAttribution, PoolResolverConfig, default_pools};
pub use resolver::{ExplorerConfig, ExplorerResolver, NodeResolver};
pub use result::{Resolution, TransactionNode, TxId};
pub use retry::RetryPolicy;
pub use walk::{ResultGraph, StepCallback, StepReport, TaintWalk, WalkSettings};
