use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use futures::stream::BoxStream;
use mirror_core::events::{ChainEvent, EventKind};
use mirror_core::types::TokenMetadata;
use mirror_core::Result;

/// Everything the mirror needs from the chain.
///
/// Queries over block ranges are inclusive on both ends and return events in
/// chain order.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest block height
    async fn current_height(&self) -> Result<u64>;

    /// Stream of new block heights. Ends when the underlying feed is lost.
    async fn subscribe_new_heights(&self) -> Result<BoxStream<'static, u64>>;

    /// Number of pools the factory has created
    async fn pool_count(&self, factory: Address) -> Result<u64>;

    async fn pool_at_index(&self, factory: Address, index: u64) -> Result<Address>;

    /// Decoded events of one kind emitted by `contract` in `[from_block, to_block]`
    async fn query_events(
        &self,
        contract: Address,
        kind: EventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainEvent>>;

    async fn asset_metadata(&self, asset: Address) -> Result<TokenMetadata>;

    /// `(base, quote)` asset addresses of a pool
    async fn pool_assets(&self, pool: Address) -> Result<(Address, Address)>;

    /// Raw last trade price of a pool
    async fn last_price(&self, pool: Address) -> Result<U256>;
}
