//! Write-through persistence of one pool's book into a [`KeyValueStore`].
//!
//! Key layout (pool addresses as given by the caller):
//!
//! | key                                 | value                          |
//! |-------------------------------------|--------------------------------|
//! | `order:{pool}:{id}`                 | order JSON                     |
//! | `price_levels:{pool}:{BUY\|SELL}`   | JSON list of `{price, orderIds}` |
//! | `{buy\|sell}_orders:{pool}:{price}` | set of order ids               |
//! | `trader_orders:{pool}:{trader}`     | set of order ids               |
//! | `market_orders:{pool}:{trader}`     | JSON list of market orders     |
//! | `latest_price:{pool}`               | decimal string                 |
//! | `pool_info:{pool}`                  | pool info JSON                 |
//! | `cursor:{pool}`                     | last replicated block          |

use crate::kv::{KeyValueStore, KvWrite};
use crate::order_book::{BookChanges, OrderBookStore};
use mirror_core::types::{MarketOrder, Order, OrderType, PoolInfo, TokenMetadata};
use mirror_core::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Persisted shape of one price bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredLevel {
    price: String,
    order_ids: Vec<String>,
}

/// Persistence handle for one pool
#[derive(Clone)]
pub struct BookPersistence {
    kv: Arc<dyn KeyValueStore>,
    pool: String,
}

impl BookPersistence {
    pub fn new(kv: Arc<dyn KeyValueStore>, pool: impl Into<String>) -> Self {
        Self {
            kv,
            pool: pool.into(),
        }
    }

    pub fn order_key(&self, id: &str) -> String {
        format!("order:{}:{}", self.pool, id)
    }

    pub fn price_levels_key(&self, side: OrderType) -> String {
        format!("price_levels:{}:{}", self.pool, side)
    }

    pub fn orders_at_price_key(&self, side: OrderType, price: &str) -> String {
        format!("{}_orders:{}:{}", side.as_str().to_lowercase(), self.pool, price)
    }

    pub fn trader_orders_key(&self, trader: &str) -> String {
        format!("trader_orders:{}:{}", self.pool, trader)
    }

    pub fn market_orders_key(&self, trader: &str) -> String {
        format!("market_orders:{}:{}", self.pool, trader)
    }

    pub fn latest_price_key(&self) -> String {
        format!("latest_price:{}", self.pool)
    }

    pub fn pool_info_key(&self) -> String {
        pool_info_key(&self.pool)
    }

    pub fn cursor_key(&self) -> String {
        format!("cursor:{}", self.pool)
    }

    /// Turn the touched keys of a book into concrete writes.
    ///
    /// Synchronous so it can run under the book's lock.
    pub fn collect_writes(&self, book: &OrderBookStore, changes: &BookChanges) -> Result<Vec<KvWrite>> {
        let mut writes = Vec::new();

        for id in &changes.orders {
            if let Some(order) = book.get_order(id) {
                writes.push(KvWrite::Set {
                    key: self.order_key(id),
                    value: serde_json::to_string(&order)?,
                });
            }
        }

        for trader in &changes.traders {
            let members = book.get_user_orders(trader).into_iter().map(|o| o.id).collect();
            writes.push(KvWrite::ReplaceSet {
                key: self.trader_orders_key(trader),
                members,
            });
        }

        for side in &changes.sides {
            let levels: Vec<StoredLevel> = book
                .price_levels(*side)
                .into_iter()
                .map(|(price, order_ids)| StoredLevel { price, order_ids })
                .collect();
            writes.push(KvWrite::Set {
                key: self.price_levels_key(*side),
                value: serde_json::to_string(&levels)?,
            });
        }

        for (side, price) in &changes.price_buckets {
            let key = self.orders_at_price_key(*side, price);
            match book.orders_at_price(*side, price) {
                Some(members) => writes.push(KvWrite::ReplaceSet { key, members }),
                None => writes.push(KvWrite::Del { key }),
            }
        }

        for trader in &changes.market_traders {
            writes.push(KvWrite::Set {
                key: self.market_orders_key(trader),
                value: serde_json::to_string(&book.get_market_orders(trader))?,
            });
        }

        if changes.latest_price {
            writes.push(KvWrite::Set {
                key: self.latest_price_key(),
                value: book.latest_price().to_string(),
            });
            writes.push(KvWrite::Set {
                key: self.pool_info_key(),
                value: serde_json::to_string(&book.get_pool_info())?,
            });
        }

        Ok(writes)
    }

    /// Write collected changes together with the cursor they bring the pool to.
    ///
    /// The batch is atomic, so a persisted cursor never runs ahead of the
    /// records it covers.
    pub async fn commit(&self, mut writes: Vec<KvWrite>, cursor: u64) -> Result<()> {
        let start = Instant::now();
        writes.push(KvWrite::Set {
            key: self.cursor_key(),
            value: cursor.to_string(),
        });
        let count = writes.len();

        self.kv.write_batch(&writes).await?;

        debug!(
            pool = %self.pool,
            writes = count,
            cursor = cursor,
            duration_us = start.elapsed().as_micros(),
            "Book changes persisted"
        );
        Ok(())
    }

    pub async fn save_pool_info(&self, info: &PoolInfo) -> Result<()> {
        self.kv
            .set(&self.pool_info_key(), &serde_json::to_string(info)?)
            .await?;
        self.kv.set(&self.latest_price_key(), &info.latest_price).await
    }

    pub async fn load_cursor(&self) -> Result<Option<u64>> {
        match self.kv.get(&self.cursor_key()).await? {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|e| MirrorError::Persistence(format!("bad cursor '{}': {}", raw, e))),
            None => Ok(None),
        }
    }

    /// Rebuild the pool's book from persisted records
    pub async fn load_book(&self, base_token: TokenMetadata, quote_token: TokenMetadata) -> Result<OrderBookStore> {
        let start = Instant::now();

        let order_prefix = format!("order:{}:", self.pool);
        let mut orders = Vec::new();
        for key in self.kv.keys(&order_prefix).await? {
            if let Some(raw) = self.kv.get(&key).await? {
                orders.push(serde_json::from_str::<Order>(&raw)?);
            }
        }

        let bids = self.load_levels(OrderType::Buy).await?;
        let asks = self.load_levels(OrderType::Sell).await?;

        let market_prefix = format!("market_orders:{}:", self.pool);
        let mut market_orders = HashMap::new();
        for key in self.kv.keys(&market_prefix).await? {
            let trader = key[market_prefix.len()..].to_string();
            if let Some(raw) = self.kv.get(&key).await? {
                market_orders.insert(trader, serde_json::from_str::<Vec<MarketOrder>>(&raw)?);
            }
        }

        let latest_price = self
            .kv
            .get(&self.latest_price_key())
            .await?
            .unwrap_or_else(|| "0".to_string());

        let order_count = orders.len();
        let book = OrderBookStore::restore(
            self.pool.clone(),
            base_token,
            quote_token,
            latest_price,
            orders,
            bids,
            asks,
            market_orders,
        );

        debug!(
            pool = %self.pool,
            orders = order_count,
            duration_ms = start.elapsed().as_millis(),
            "Book restored from persistence"
        );
        Ok(book)
    }

    async fn load_levels(&self, side: OrderType) -> Result<Vec<(String, Vec<String>)>> {
        let Some(raw) = self.kv.get(&self.price_levels_key(side)).await? else {
            return Ok(Vec::new());
        };
        let levels: Vec<StoredLevel> = serde_json::from_str(&raw)?;
        Ok(levels.into_iter().map(|l| (l.price, l.order_ids)).collect())
    }
}

pub fn pool_info_key(pool: &str) -> String {
    format!("pool_info:{}", pool)
}

/// Every pool that has persisted its info
pub async fn load_all_pools(kv: &dyn KeyValueStore) -> Result<Vec<PoolInfo>> {
    let mut pools = Vec::new();
    for key in kv.keys("pool_info:").await? {
        if let Some(raw) = kv.get(&key).await? {
            pools.push(serde_json::from_str::<PoolInfo>(&raw)?);
        }
    }
    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;

    fn token(symbol: &str, decimals: u8) -> TokenMetadata {
        TokenMetadata {
            address: format!("0x{}", symbol.to_lowercase()),
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            decimals,
        }
    }

    fn order(id: &str, side: OrderType, price: &str, amount: &str) -> Order {
        Order {
            id: id.to_string(),
            trader: "0xTrader".to_string(),
            price: price.to_string(),
            amount: amount.to_string(),
            filled: "0".to_string(),
            remaining_amount: amount.to_string(),
            order_type: side,
            active: true,
            timestamp: 100 + id.len() as u64,
        }
    }

    #[tokio::test]
    async fn test_flush_and_restore_book() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let persistence = BookPersistence::new(kv.clone(), "0xpool");

        let mut book = OrderBookStore::new("0xpool", token("BASE", 18), token("QUOTE", 6), "0");
        book.add_order(order("1", OrderType::Buy, "10", "5"));
        book.add_order(order("2", OrderType::Sell, "11", "4"));
        book.add_order(order("3", OrderType::Sell, "12", "1"));
        book.remove_order("3");
        book.set_latest_price("10.5");
        book.add_market_order(
            MarketOrder {
                timestamp: 7,
                amount: "2".to_string(),
                order_type: OrderType::Buy,
            },
            "0xTrader",
        );

        let changes = book.take_changes();
        let writes = persistence.collect_writes(&book, &changes).unwrap();
        persistence.commit(writes, 42).await.unwrap();

        assert_eq!(kv.smembers("sell_orders:0xpool:11").await.unwrap(), vec!["2"]);
        assert!(kv.smembers("sell_orders:0xpool:12").await.unwrap().is_empty());
        assert_eq!(kv.smembers("trader_orders:0xpool:0xtrader").await.unwrap().len(), 3);
        assert_eq!(persistence.load_cursor().await.unwrap(), Some(42));

        let restored = persistence
            .load_book(token("BASE", 18), token("QUOTE", 6))
            .await
            .unwrap();
        assert_eq!(restored.get_order_book(10), book.get_order_book(10));
        assert_eq!(restored.get_order("3"), book.get_order("3"));
        assert_eq!(restored.get_user_orders("0xtrader").len(), 3);
        assert_eq!(restored.get_market_orders("0xtrader"), book.get_market_orders("0xtrader"));
        assert_eq!(restored.latest_price(), "10.5");

        let pools = load_all_pools(kv.as_ref()).await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].latest_price, "10.5");
    }

    #[tokio::test]
    async fn test_missing_cursor_and_bad_cursor() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let persistence = BookPersistence::new(kv.clone(), "0xpool");
        assert_eq!(persistence.load_cursor().await.unwrap(), None);

        kv.set("cursor:0xpool", "not-a-number").await.unwrap();
        assert!(matches!(
            persistence.load_cursor().await,
            Err(MirrorError::Persistence(_))
        ));
    }

    #[test]
    fn test_key_layout() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let p = BookPersistence::new(kv, "0xP");
        assert_eq!(p.order_key("9"), "order:0xP:9");
        assert_eq!(p.price_levels_key(OrderType::Buy), "price_levels:0xP:BUY");
        assert_eq!(p.orders_at_price_key(OrderType::Sell, "1.5"), "sell_orders:0xP:1.5");
        assert_eq!(p.latest_price_key(), "latest_price:0xP");
        assert_eq!(p.cursor_key(), "cursor:0xP");
    }
}
