use serde::{Deserialize, Serialize};

/// Push notification emitted by the mirror for downstream subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MirrorNotification {
    /// A new pool was discovered and its replicator started
    #[serde(rename_all = "camelCase")]
    PoolCreated { pool_address: String },
    /// A block round applied at least one event to the pool's book
    #[serde(rename_all = "camelCase")]
    OrderBookUpdated { pool_address: String, block: u64 },
}

impl MirrorNotification {
    pub fn pool_address(&self) -> &str {
        match self {
            Self::PoolCreated { pool_address } => pool_address,
            Self::OrderBookUpdated { pool_address, .. } => pool_address,
        }
    }
}
