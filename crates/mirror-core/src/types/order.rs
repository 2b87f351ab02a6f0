use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl OrderType {
    /// On-chain encoding: 0 is buy, anything else is sell
    pub fn from_raw(value: u8) -> Self {
        if value == 0 {
            Self::Buy
        } else {
            Self::Sell
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(format!("unknown order type '{}'", other)),
        }
    }
}

/// A resting limit order. Amounts are asset-scaled decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub trader: String,
    pub price: String,
    /// Original size
    pub amount: String,
    /// Cumulative filled size
    pub filled: String,
    pub remaining_amount: String,
    pub order_type: OrderType,
    pub active: bool,
    /// Creation time in seconds
    pub timestamp: u64,
}

/// Append-only record of an executed market order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrder {
    pub timestamp: u64,
    pub amount: String,
    pub order_type: OrderType,
}

/// Active orders resting at one price, derived on read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceLevel {
    pub price: String,
    pub orders: Vec<Order>,
    pub total_volume: String,
}

/// Outcome of a liquidity walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountOutResult {
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub output_amount: String,
    pub prices: Vec<String>,
}

impl AmountOutResult {
    pub fn filled(output_amount: String, prices: Vec<String>) -> Self {
        Self {
            is_error: false,
            error_message: None,
            output_amount,
            prices,
        }
    }

    pub fn failed(message: impl Into<String>, output_amount: String, prices: Vec<String>) -> Self {
        Self {
            is_error: true,
            error_message: Some(message.into()),
            output_amount,
            prices,
        }
    }
}
