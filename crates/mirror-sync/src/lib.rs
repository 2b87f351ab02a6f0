mod chain;
mod provider;
mod ranges;
mod registry;
mod replicator;
mod scheduler;

#[cfg(test)]
mod testing;

pub use chain::ChainClient;
pub use provider::AlloyChainClient;
pub use ranges::block_windows;
pub use registry::{PoolCreatedCallback, PoolRegistry, REGISTRY_CONSUMER_ID};
pub use replicator::{PoolReplicator, ReplicatorContext};
pub use scheduler::{BlockConsumer, BlockScheduler, RoundOutcome};
