use alloy::primitives::Address;
use async_trait::async_trait;
use futures::future::try_join_all;
use mirror_core::events::{ChainEvent, EventKind};
use mirror_core::types::{
    now_secs, AmountOutResult, MarketOrder, MirrorNotification, Order, OrderBookSnapshot, OrderType,
    PoolInfo,
};
use mirror_core::units::AssetScale;
use mirror_core::{CursorFailurePolicy, ReplicationConfig, Result};
use mirror_store::{BookPersistence, KeyValueStore, OrderBookStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::ranges::block_windows;
use crate::scheduler::BlockConsumer;

/// Shared dependencies for building replicators
#[derive(Clone)]
pub struct ReplicatorContext {
    pub chain: Arc<dyn ChainClient>,
    pub config: ReplicationConfig,
    /// Present in persistence mode
    pub store: Option<Arc<dyn KeyValueStore>>,
    pub notifications: broadcast::Sender<MirrorNotification>,
}

/// Mirrors one pool's on-chain order book into an [`OrderBookStore`].
///
/// All raw integer amounts are scaled here; the store only sees decimal strings.
pub struct PoolReplicator {
    address: Address,
    pool_key: String,
    chain: Arc<dyn ChainClient>,
    config: ReplicationConfig,
    base_scale: AssetScale,
    quote_scale: AssetScale,
    book: RwLock<OrderBookStore>,
    /// First block not yet applied (last processed + 1)
    next_block: AtomicU64,
    /// First block not yet covered by the persisted cursor
    persisted_next: AtomicU64,
    /// Serializes catch-up and block rounds
    sync_lock: Mutex<()>,
    persistence: Option<BookPersistence>,
    notifications: broadcast::Sender<MirrorNotification>,
}

impl PoolReplicator {
    /// Fetch pool assets, decimals and last price, then build (or restore) the book.
    pub async fn initialize(address: Address, ctx: &ReplicatorContext) -> Result<Self> {
        let chain = Arc::clone(&ctx.chain);
        let pool_key = address.to_string();

        let ((base, quote), raw_price) =
            tokio::try_join!(chain.pool_assets(address), chain.last_price(address))?;
        let (base_token, quote_token) =
            tokio::try_join!(chain.asset_metadata(base), chain.asset_metadata(quote))?;

        let base_scale = AssetScale::new(base_token.decimals);
        let quote_scale = AssetScale::new(quote_token.decimals);
        let persistence = ctx
            .store
            .as_ref()
            .map(|kv| BookPersistence::new(Arc::clone(kv), pool_key.clone()));

        let restored_cursor = match &persistence {
            Some(p) => p.load_cursor().await?,
            None => None,
        };

        let (book, next_block) = match (&persistence, restored_cursor) {
            (Some(p), Some(cursor)) => {
                let book = p.load_book(base_token, quote_token).await?;
                info!(
                    pool = %pool_key,
                    cursor = cursor,
                    orders = book.count(),
                    "Restored order book from persistence"
                );
                (book, cursor.saturating_add(1))
            }
            _ => {
                let book = OrderBookStore::new(
                    pool_key.clone(),
                    base_token,
                    quote_token,
                    quote_scale.normalize(raw_price),
                );
                if let Some(p) = &persistence {
                    p.save_pool_info(&book.get_pool_info()).await?;
                }
                (book, ctx.config.start_block)
            }
        };

        info!(
            pool = %pool_key,
            base_decimals = base_scale.decimals(),
            quote_decimals = quote_scale.decimals(),
            next_block = next_block,
            "Pool replicator initialized"
        );

        Ok(Self {
            address,
            pool_key,
            chain,
            config: ctx.config.clone(),
            base_scale,
            quote_scale,
            book: RwLock::new(book),
            next_block: AtomicU64::new(next_block),
            persisted_next: AtomicU64::new(next_block),
            sync_lock: Mutex::new(()),
            persistence,
            notifications: ctx.notifications.clone(),
        })
    }

    /// Catch up from the cursor to the current chain height
    pub async fn start(&self) -> Result<()> {
        let height = self.chain.current_height().await?;
        let applied = self.sync_to(height).await?;
        info!(
            pool = %self.pool_key,
            height = height,
            events = applied,
            "Pool replicator caught up"
        );
        Ok(())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Last block whose events have been applied, if any
    pub fn cursor(&self) -> Option<u64> {
        self.next_block.load(Ordering::Acquire).checked_sub(1)
    }

    /// Apply every event in `(cursor, height]`, window by window.
    ///
    /// Returns the number of events applied.
    pub async fn sync_to(&self, height: u64) -> Result<usize> {
        let _guard = self.sync_lock.lock().await;

        let from = self.next_block.load(Ordering::Acquire);
        if from > height {
            self.flush_pending().await;
            return Ok(0);
        }

        let mut applied = 0usize;
        let mut failure = None;

        for (start, end) in block_windows(from, height, self.config.log_batch_size) {
            match self.sync_window(start, end).await {
                Ok(count) => {
                    applied += count;
                    self.advance(end).await;
                }
                Err(e) => {
                    match self.config.failure_policy {
                        CursorFailurePolicy::Retry => {
                            warn!(
                                pool = %self.pool_key,
                                from = start,
                                to = end,
                                error = %e,
                                "Window failed, cursor held for retry"
                            );
                        }
                        CursorFailurePolicy::BestEffort => {
                            error!(
                                pool = %self.pool_key,
                                from = start,
                                to = height,
                                error = %e,
                                "Window failed, skipping range"
                            );
                            self.advance(height).await;
                        }
                    }
                    failure = Some(e);
                    break;
                }
            }
        }

        if applied > 0 {
            // no receivers is fine
            let _ = self.notifications.send(MirrorNotification::OrderBookUpdated {
                pool_address: self.pool_key.clone(),
                block: self.cursor().unwrap_or(height),
            });
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(applied),
        }
    }

    /// Fetch every kind for the window first, then apply kind by kind
    async fn sync_window(&self, from: u64, to: u64) -> Result<usize> {
        let start = Instant::now();

        let batches = try_join_all(
            EventKind::POOL_KINDS
                .iter()
                .map(|kind| self.chain.query_events(self.address, *kind, from, to)),
        )
        .await?;

        let total: usize = batches.iter().map(Vec::len).sum();
        if total == 0 {
            return Ok(0);
        }

        let mut per_kind: HashMap<EventKind, u64> = HashMap::new();
        {
            let mut book = self.book.write();
            for event in batches.iter().flatten() {
                if self.apply_event(&mut book, event) {
                    *per_kind.entry(event.kind()).or_default() += 1;
                }
            }
        }

        for (kind, count) in &per_kind {
            mirror_metrics::counters::events_applied(*count, kind.as_str());
        }
        mirror_metrics::histograms::pool_sync_duration(start.elapsed());

        debug!(
            pool = %self.pool_key,
            from = from,
            to = to,
            fetched = total,
            duration_ms = start.elapsed().as_millis(),
            "Window applied"
        );

        Ok(total)
    }

    async fn advance(&self, last_block: u64) {
        self.next_block.fetch_max(last_block.saturating_add(1), Ordering::AcqRel);
        mirror_metrics::gauges::set_pool_cursor(&self.pool_key, last_block);
        self.persist().await;
    }

    /// Last block covered by the persisted cursor, if any
    pub fn persisted_cursor(&self) -> Option<u64> {
        self.persisted_next.load(Ordering::Acquire).checked_sub(1)
    }

    async fn flush_pending(&self) {
        if self.persistence.is_some()
            && self.persisted_next.load(Ordering::Acquire) < self.next_block.load(Ordering::Acquire)
        {
            self.persist().await;
        }
    }

    /// Commit touched keys together with the in-memory cursor.
    ///
    /// On failure the changes go back to the book and the persisted cursor
    /// stays at the last committed block, so a restart replays from there.
    async fn persist(&self) {
        let Some(p) = &self.persistence else {
            return;
        };
        let next = self.next_block.load(Ordering::Acquire);
        let Some(cursor) = next.checked_sub(1) else {
            return;
        };

        let (changes, writes) = {
            let mut book = self.book.write();
            let changes = book.take_changes();
            let writes = p.collect_writes(&book, &changes);
            (changes, writes)
        };

        let result = match writes {
            Ok(writes) => p.commit(writes, cursor).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => self.persisted_next.store(next, Ordering::Release),
            Err(e) => {
                self.book.write().requeue_changes(changes);
                mirror_metrics::counters::persistence_errors(1);
                error!(
                    pool = %self.pool_key,
                    cursor = cursor,
                    persisted_cursor = ?self.persisted_cursor(),
                    error = %e,
                    "Failed to persist book changes, persisted cursor held"
                );
            }
        }
    }

    /// Map one decoded event onto the book. Returns false when it was a no-op.
    fn apply_event(&self, book: &mut OrderBookStore, event: &ChainEvent) -> bool {
        match event {
            ChainEvent::OrderCreated {
                trader,
                order_id,
                price,
                amount,
                order_type,
            } => {
                let id = order_id.to_string();
                if book.get_order(&id).is_some() {
                    // creation replay would duplicate the bucket entry
                    debug!(pool = %self.pool_key, order_id = %id, "Skipping replayed order creation");
                    return false;
                }
                let amount = self.base_scale.normalize(*amount);
                book.add_order(Order {
                    id,
                    trader: trader.to_string(),
                    price: self.quote_scale.normalize(*price),
                    amount: amount.clone(),
                    filled: "0".to_string(),
                    remaining_amount: amount,
                    order_type: OrderType::from_raw(*order_type),
                    active: true,
                    timestamp: now_secs(),
                });
                true
            }
            ChainEvent::OrderFilled {
                order_id,
                trader,
                filled,
                remaining,
                ..
            } => book.update_order_filled(
                &order_id.to_string(),
                &self.base_scale.normalize(*filled),
                &self.base_scale.normalize(*remaining),
                &trader.to_string(),
                !remaining.is_zero(),
            ),
            ChainEvent::OrderCancelled { order_id } => book.remove_order(&order_id.to_string()),
            ChainEvent::OrderUpdated {
                order_id,
                trader,
                new_amount,
            } => book.update_order(
                &order_id.to_string(),
                &self.base_scale.normalize(*new_amount),
                &trader.to_string(),
            ),
            ChainEvent::LatestPriceChanged { price } => {
                book.set_latest_price(self.quote_scale.normalize(*price));
                true
            }
            ChainEvent::MarketOrderExecuted {
                trader,
                order_type,
                filled,
                ..
            } => {
                let side = OrderType::from_raw(*order_type);
                // a buy spends quote, a sell spends base
                let amount = match side {
                    OrderType::Buy => self.quote_scale.normalize(*filled),
                    OrderType::Sell => self.base_scale.normalize(*filled),
                };
                book.add_market_order(
                    MarketOrder {
                        timestamp: now_secs(),
                        amount,
                        order_type: side,
                    },
                    &trader.to_string(),
                );
                true
            }
            ChainEvent::PoolCreated { .. } => false,
        }
    }

    pub fn get_order_book(&self, depth: usize) -> OrderBookSnapshot {
        self.book.read().get_order_book(depth)
    }

    pub fn get_order(&self, id: &str) -> Option<Order> {
        self.book.read().get_order(id)
    }

    pub fn get_user_orders(&self, trader: &str) -> Vec<Order> {
        self.book.read().get_user_orders(trader)
    }

    pub fn get_user_market_orders(&self, trader: &str) -> Vec<MarketOrder> {
        self.book.read().get_market_orders(trader)
    }

    pub fn get_pool_info(&self) -> PoolInfo {
        self.book.read().get_pool_info()
    }

    pub fn get_amount_out(&self, order_type: OrderType, amount: &str) -> AmountOutResult {
        self.book.read().get_amount_out(order_type, amount)
    }
}

#[async_trait]
impl BlockConsumer for PoolReplicator {
    async fn process_block(&self, height: u64) -> Result<()> {
        self.sync_to(height).await.map(|_| ())
    }
}
