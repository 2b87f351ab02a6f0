mod notification;
mod order;
mod pool;

pub use notification::MirrorNotification;

pub use order::{AmountOutResult, MarketOrder, Order, OrderType, PriceLevel};
pub use pool::{OrderBookSnapshot, PoolInfo, TokenMetadata};

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in seconds since Unix epoch
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
