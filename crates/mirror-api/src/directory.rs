use alloy_primitives::Address;
use async_trait::async_trait;
use mirror_core::types::{
    AmountOutResult, MarketOrder, Order, OrderBookSnapshot, OrderType, PoolInfo,
};
use mirror_sync::{PoolRegistry, PoolReplicator};
use std::sync::Arc;

/// Read-only view of one replicated pool
pub trait PoolView: Send + Sync {
    fn order_book(&self, depth: usize) -> OrderBookSnapshot;
    fn order(&self, id: &str) -> Option<Order>;
    fn user_orders(&self, trader: &str) -> Vec<Order>;
    fn user_market_orders(&self, trader: &str) -> Vec<MarketOrder>;
    fn pool_info(&self) -> PoolInfo;
    fn amount_out(&self, order_type: OrderType, amount: &str) -> AmountOutResult;
}

/// Lookup of pools by address
#[async_trait]
pub trait PoolDirectory: Send + Sync {
    fn pool(&self, address: &Address) -> Option<Arc<dyn PoolView>>;
    async fn all_pools(&self) -> mirror_core::Result<Vec<PoolInfo>>;
}

impl PoolView for PoolReplicator {
    fn order_book(&self, depth: usize) -> OrderBookSnapshot {
        self.get_order_book(depth)
    }

    fn order(&self, id: &str) -> Option<Order> {
        self.get_order(id)
    }

    fn user_orders(&self, trader: &str) -> Vec<Order> {
        self.get_user_orders(trader)
    }

    fn user_market_orders(&self, trader: &str) -> Vec<MarketOrder> {
        self.get_user_market_orders(trader)
    }

    fn pool_info(&self) -> PoolInfo {
        self.get_pool_info()
    }

    fn amount_out(&self, order_type: OrderType, amount: &str) -> AmountOutResult {
        self.get_amount_out(order_type, amount)
    }
}

#[async_trait]
impl PoolDirectory for PoolRegistry {
    fn pool(&self, address: &Address) -> Option<Arc<dyn PoolView>> {
        self.get_pool_listener(address).map(|r| r as Arc<dyn PoolView>)
    }

    async fn all_pools(&self) -> mirror_core::Result<Vec<PoolInfo>> {
        self.get_all_pools().await
    }
}
