use serde::{Deserialize, Serialize};

use super::PriceLevel;

/// ERC-20 metadata of one side of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Depth-limited view of a pool's book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookSnapshot {
    pub base_token: TokenMetadata,
    pub quote_token: TokenMetadata,
    pub latest_price: String,
    /// Best (highest) bid first
    pub bids: Vec<PriceLevel>,
    /// Best (lowest) ask first
    pub asks: Vec<PriceLevel>,
}

/// Pool identity plus last trade price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    pub address: String,
    pub base_token: TokenMetadata,
    pub quote_token: TokenMetadata,
    pub latest_price: String,
}
