use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use mirror_core::events::{ChainEvent, EventKind};
use mirror_core::types::{MirrorNotification, PoolInfo};
use mirror_core::{CursorFailurePolicy, Result};
use mirror_store::load_all_pools;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::ranges::block_windows;
use crate::replicator::{PoolReplicator, ReplicatorContext};
use crate::scheduler::{BlockConsumer, BlockScheduler};

/// Consumer id the registry registers under
pub const REGISTRY_CONSUMER_ID: &str = "pool-registry";

/// Invoked once per newly discovered pool
pub type PoolCreatedCallback = Arc<dyn Fn(Address) + Send + Sync>;

/// Owns every known pool and its replicator
pub struct PoolRegistry {
    factory: Address,
    ctx: ReplicatorContext,
    scheduler: Arc<BlockScheduler>,
    pools: DashMap<Address, Arc<PoolReplicator>>,
    /// Single writer for `pools`
    add_lock: Mutex<()>,
    /// First factory block not yet scanned for pool creations
    next_block: AtomicU64,
    on_pool_created: Option<PoolCreatedCallback>,
}

impl PoolRegistry {
    pub fn new(factory: Address, ctx: ReplicatorContext, scheduler: Arc<BlockScheduler>) -> Self {
        Self {
            factory,
            ctx,
            scheduler,
            pools: DashMap::new(),
            add_lock: Mutex::new(()),
            next_block: AtomicU64::new(0),
            on_pool_created: None,
        }
    }

    pub fn with_pool_created_callback(mut self, callback: PoolCreatedCallback) -> Self {
        self.on_pool_created = Some(callback);
        self
    }

    /// Start a replicator for every pool the factory already lists, then
    /// register for new blocks. Every existing pool is queryable on return.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let start = Instant::now();
        let height = self.ctx.chain.current_height().await?;
        let count = self.ctx.chain.pool_count(self.factory).await?;

        info!(factory = %self.factory, pools = count, height = height, "Enumerating existing pools");

        for index in 0..count {
            let pool = self.ctx.chain.pool_at_index(self.factory, index).await?;
            self.add_pool(pool).await?;
        }

        // creations up to `height` are covered by the enumeration
        self.next_block.store(height.saturating_add(1), Ordering::Release);
        self.scheduler
            .register_consumer(REGISTRY_CONSUMER_ID, Arc::clone(self) as Arc<dyn BlockConsumer>);

        info!(
            pools = self.pools.len(),
            duration_ms = start.elapsed().as_millis(),
            "Pool registry started"
        );
        Ok(())
    }

    /// Create, start and register a replicator unless the pool is already known.
    ///
    /// Returns true when a new replicator was added.
    pub async fn add_pool(&self, address: Address) -> Result<bool> {
        let _guard = self.add_lock.lock().await;
        if self.pools.contains_key(&address) {
            debug!(pool = %address, "Pool already replicated");
            return Ok(false);
        }

        let replicator = Arc::new(PoolReplicator::initialize(address, &self.ctx).await?);
        replicator.start().await?;

        self.pools.insert(address, Arc::clone(&replicator));
        self.scheduler
            .register_consumer(address.to_string(), replicator as Arc<dyn BlockConsumer>);

        mirror_metrics::counters::pools_discovered(1);
        mirror_metrics::gauges::set_pools(self.pools.len());
        info!(pool = %address, total_pools = self.pools.len(), "Added pool replicator");

        Ok(true)
    }

    pub fn get_pool_listener(&self, address: &Address) -> Option<Arc<PoolReplicator>> {
        self.pools.get(address).map(|r| Arc::clone(r.value()))
    }

    /// Pool info from persistence when enabled, otherwise from live replicators
    pub async fn get_all_pools(&self) -> Result<Vec<PoolInfo>> {
        if let Some(kv) = &self.ctx.store {
            return load_all_pools(kv.as_ref()).await;
        }

        let mut entries: Vec<(Address, PoolInfo)> = self
            .pools
            .iter()
            .map(|r| (*r.key(), r.value().get_pool_info()))
            .collect();
        entries.sort_by_key(|(address, _)| *address);
        Ok(entries.into_iter().map(|(_, info)| info).collect())
    }

    pub fn count(&self) -> usize {
        self.pools.len()
    }

    /// Last factory block scanned for pool creations
    pub fn cursor(&self) -> Option<u64> {
        self.next_block.load(Ordering::Acquire).checked_sub(1)
    }

    fn advance(&self, last_block: u64) {
        self.next_block.fetch_max(last_block.saturating_add(1), Ordering::AcqRel);
    }

    async fn discover_window(&self, from: u64, to: u64) -> Result<()> {
        let events = self
            .ctx
            .chain
            .query_events(self.factory, EventKind::PoolCreated, from, to)
            .await?;

        for event in events {
            let ChainEvent::PoolCreated { pool } = event else {
                continue;
            };
            if self.add_pool(pool).await? {
                if let Some(callback) = &self.on_pool_created {
                    callback(pool);
                }
                let _ = self.ctx.notifications.send(MirrorNotification::PoolCreated {
                    pool_address: pool.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BlockConsumer for PoolRegistry {
    async fn process_block(&self, height: u64) -> Result<()> {
        let from = self.next_block.load(Ordering::Acquire);
        if from > height {
            return Ok(());
        }

        for (start, end) in block_windows(from, height, self.ctx.config.log_batch_size) {
            if let Err(e) = self.discover_window(start, end).await {
                match self.ctx.config.failure_policy {
                    CursorFailurePolicy::Retry => {
                        warn!(from = start, to = end, error = %e, "Pool discovery failed, cursor held for retry");
                    }
                    CursorFailurePolicy::BestEffort => {
                        error!(from = start, to = height, error = %e, "Pool discovery failed, skipping range");
                        self.advance(height);
                    }
                }
                return Err(e);
            }
            self.advance(end);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChain;
    use alloy::primitives::{address, U256};
    use mirror_core::{ReplicationConfig, SchedulerConfig};
    use mirror_store::{KeyValueStore, MemoryKeyValueStore};
    use parking_lot::Mutex as SyncMutex;
    use tokio::sync::broadcast;

    const BASE: Address = address!("00000000000000000000000000000000000000b1");
    const QUOTE: Address = address!("00000000000000000000000000000000000000c1");
    const FACTORY: Address = address!("00000000000000000000000000000000000000f1");
    const POOL_A: Address = address!("00000000000000000000000000000000000000a1");
    const POOL_B: Address = address!("00000000000000000000000000000000000000a2");

    fn chain() -> Arc<FakeChain> {
        let chain = Arc::new(FakeChain::new(5));
        chain.add_token(BASE, "BASE", 18);
        chain.add_token(QUOTE, "USDC", 6);
        chain.deploy_pool(POOL_A, BASE, QUOTE, U256::from(1_000_000u64));
        chain.deploy_pool(POOL_B, BASE, QUOTE, U256::from(2_000_000u64));
        chain
    }

    fn registry(
        chain: Arc<FakeChain>,
        store: Option<Arc<dyn KeyValueStore>>,
    ) -> (Arc<PoolRegistry>, Arc<BlockScheduler>, broadcast::Receiver<MirrorNotification>) {
        registry_with_callback(chain, store, None)
    }

    fn registry_with_callback(
        chain: Arc<FakeChain>,
        store: Option<Arc<dyn KeyValueStore>>,
        callback: Option<PoolCreatedCallback>,
    ) -> (Arc<PoolRegistry>, Arc<BlockScheduler>, broadcast::Receiver<MirrorNotification>) {
        let scheduler = Arc::new(BlockScheduler::new(chain.clone(), SchedulerConfig::default()));
        let (notifications, rx) = broadcast::channel(16);
        let ctx = ReplicatorContext {
            chain,
            config: ReplicationConfig::default(),
            store,
            notifications,
        };
        let mut registry = PoolRegistry::new(FACTORY, ctx, Arc::clone(&scheduler));
        if let Some(callback) = callback {
            registry = registry.with_pool_created_callback(callback);
        }
        (Arc::new(registry), scheduler, rx)
    }

    #[tokio::test]
    async fn test_start_enumerates_existing_pools() {
        let chain = chain();
        chain.list_pool(POOL_A);
        chain.list_pool(POOL_B);
        let (registry, scheduler, _rx) = registry(chain, None);

        registry.start().await.unwrap();

        assert_eq!(registry.count(), 2);
        assert!(registry.get_pool_listener(&POOL_A).is_some());
        assert!(registry.get_pool_listener(&address!("0000000000000000000000000000000000000999")).is_none());
        // two replicators plus the registry itself
        assert_eq!(scheduler.consumer_count(), 3);
        assert_eq!(registry.cursor(), Some(5));

        let pools = registry.get_all_pools().await.unwrap();
        let prices: Vec<&str> = pools.iter().map(|p| p.latest_price.as_str()).collect();
        assert_eq!(prices, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_duplicate_address_creates_one_replicator() {
        let chain = chain();
        let (registry, scheduler, _rx) = registry(chain, None);

        assert!(registry.add_pool(POOL_A).await.unwrap());
        assert!(!registry.add_pool(POOL_A).await.unwrap());
        assert_eq!(registry.count(), 1);
        assert_eq!(scheduler.consumer_count(), 1);
    }

    #[tokio::test]
    async fn test_discovery_adds_new_pools_and_notifies_once() {
        let chain = chain();
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        let callback: PoolCreatedCallback = {
            let seen = Arc::clone(&seen);
            Arc::new(move |pool| seen.lock().push(pool))
        };
        let (registry, _scheduler, mut rx) = registry_with_callback(chain.clone(), None, Some(callback));
        registry.start().await.unwrap();

        chain.emit(FACTORY, 6, ChainEvent::PoolCreated { pool: POOL_B });
        chain.emit(FACTORY, 7, ChainEvent::PoolCreated { pool: POOL_B });
        chain.set_height(7);

        registry.process_block(7).await.unwrap();

        assert_eq!(registry.count(), 1);
        assert_eq!(*seen.lock(), vec![POOL_B]);
        assert_eq!(registry.cursor(), Some(7));
        assert_eq!(
            rx.try_recv().unwrap(),
            MirrorNotification::PoolCreated {
                pool_address: POOL_B.to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_discovery_holds_cursor() {
        let chain = chain();
        let (registry, _scheduler, _rx) = registry(chain.clone(), None);
        registry.start().await.unwrap();

        chain.emit(FACTORY, 6, ChainEvent::PoolCreated { pool: POOL_A });
        chain.fail_queries(FACTORY, EventKind::PoolCreated, true);
        assert!(registry.process_block(6).await.is_err());
        assert_eq!(registry.cursor(), Some(5));

        chain.fail_queries(FACTORY, EventKind::PoolCreated, false);
        registry.process_block(6).await.unwrap();
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_all_pools_from_persistence() {
        let chain = chain();
        chain.list_pool(POOL_A);
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let (registry, _scheduler, _rx) = registry(chain, Some(kv));

        registry.start().await.unwrap();
        let pools = registry.get_all_pools().await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].address, POOL_A.to_string());
    }
}
