use alloy_primitives::{Address, Log, B256, U256};
use alloy_sol_types::SolEvent;

use super::{
    LatestPriceUpdated, MarketOrderExecuted, OrderCancelled, OrderCreated, OrderFilled,
    OrderUpdated, PoolCreated,
};
use crate::error::{MirrorError, Result};

/// Kind of on-chain event the mirror understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PoolCreated,
    OrderCreated,
    OrderFilled,
    OrderCancelled,
    OrderUpdated,
    LatestPriceChanged,
    MarketOrderExecuted,
}

impl EventKind {
    /// Pool event kinds in the order a replicator applies them
    pub const POOL_KINDS: [EventKind; 6] = [
        EventKind::OrderCreated,
        EventKind::OrderFilled,
        EventKind::OrderCancelled,
        EventKind::OrderUpdated,
        EventKind::LatestPriceChanged,
        EventKind::MarketOrderExecuted,
    ];

    pub fn signature_hash(&self) -> B256 {
        match self {
            EventKind::PoolCreated => PoolCreated::SIGNATURE_HASH,
            EventKind::OrderCreated => OrderCreated::SIGNATURE_HASH,
            EventKind::OrderFilled => OrderFilled::SIGNATURE_HASH,
            EventKind::OrderCancelled => OrderCancelled::SIGNATURE_HASH,
            EventKind::OrderUpdated => OrderUpdated::SIGNATURE_HASH,
            EventKind::LatestPriceChanged => LatestPriceUpdated::SIGNATURE_HASH,
            EventKind::MarketOrderExecuted => MarketOrderExecuted::SIGNATURE_HASH,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PoolCreated => "PoolCreated",
            EventKind::OrderCreated => "OrderCreated",
            EventKind::OrderFilled => "OrderFilled",
            EventKind::OrderCancelled => "OrderCancelled",
            EventKind::OrderUpdated => "OrderUpdated",
            EventKind::LatestPriceChanged => "LatestPriceChanged",
            EventKind::MarketOrderExecuted => "MarketOrderExecuted",
        }
    }
}

/// A decoded chain event with raw (unscaled) integer amounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    PoolCreated {
        pool: Address,
    },
    OrderCreated {
        trader: Address,
        order_id: U256,
        price: U256,
        amount: U256,
        order_type: u8,
    },
    OrderFilled {
        order_id: U256,
        trader: Address,
        filled: U256,
        remaining: U256,
        order_type: u8,
    },
    OrderCancelled {
        order_id: U256,
    },
    OrderUpdated {
        order_id: U256,
        trader: Address,
        new_amount: U256,
    },
    LatestPriceChanged {
        price: U256,
    },
    MarketOrderExecuted {
        trader: Address,
        amount: U256,
        price: U256,
        order_type: u8,
        filled: U256,
    },
}

impl ChainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChainEvent::PoolCreated { .. } => EventKind::PoolCreated,
            ChainEvent::OrderCreated { .. } => EventKind::OrderCreated,
            ChainEvent::OrderFilled { .. } => EventKind::OrderFilled,
            ChainEvent::OrderCancelled { .. } => EventKind::OrderCancelled,
            ChainEvent::OrderUpdated { .. } => EventKind::OrderUpdated,
            ChainEvent::LatestPriceChanged { .. } => EventKind::LatestPriceChanged,
            ChainEvent::MarketOrderExecuted { .. } => EventKind::MarketOrderExecuted,
        }
    }

    /// Decode a raw log as the given event kind
    pub fn decode(kind: EventKind, log: &Log) -> Result<Self> {
        let decode_err = |e: alloy_sol_types::Error| MirrorError::EventDecode(format!("{}: {}", kind.as_str(), e));

        let event = match kind {
            EventKind::PoolCreated => {
                let event = PoolCreated::decode_log(log).map_err(decode_err)?;
                ChainEvent::PoolCreated { pool: event.pool }
            }
            EventKind::OrderCreated => {
                let event = OrderCreated::decode_log(log).map_err(decode_err)?;
                ChainEvent::OrderCreated {
                    trader: event.trader,
                    order_id: event.orderId,
                    price: event.price,
                    amount: event.amount,
                    order_type: event.orderType,
                }
            }
            EventKind::OrderFilled => {
                let event = OrderFilled::decode_log(log).map_err(decode_err)?;
                ChainEvent::OrderFilled {
                    order_id: event.orderId,
                    trader: event.trader,
                    filled: event.filledAmount,
                    remaining: event.remainingAmount,
                    order_type: event.orderType,
                }
            }
            EventKind::OrderCancelled => {
                let event = OrderCancelled::decode_log(log).map_err(decode_err)?;
                ChainEvent::OrderCancelled {
                    order_id: event.orderId,
                }
            }
            EventKind::OrderUpdated => {
                let event = OrderUpdated::decode_log(log).map_err(decode_err)?;
                ChainEvent::OrderUpdated {
                    order_id: event.orderId,
                    trader: event.trader,
                    new_amount: event.newAmount,
                }
            }
            EventKind::LatestPriceChanged => {
                let event = LatestPriceUpdated::decode_log(log).map_err(decode_err)?;
                ChainEvent::LatestPriceChanged { price: event.price }
            }
            EventKind::MarketOrderExecuted => {
                let event = MarketOrderExecuted::decode_log(log).map_err(decode_err)?;
                ChainEvent::MarketOrderExecuted {
                    trader: event.trader,
                    amount: event.amount,
                    price: event.price,
                    order_type: event.orderType,
                    filled: event.filledAmount,
                }
            }
        };

        Ok(event)
    }
}
