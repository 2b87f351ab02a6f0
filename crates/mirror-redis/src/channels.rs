/// Pub/sub channel names for mirror notifications

/// Pool discovery channel
pub const POOLS_CHANNEL: &str = "pools";

/// Order book updates for one pool
pub fn orderbook_channel(pool_address: &str) -> String {
    format!("orderbook:{}", pool_address)
}
