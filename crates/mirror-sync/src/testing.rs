//! Scripted in-memory chain for tests.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use mirror_core::events::{ChainEvent, EventKind};
use mirror_core::types::TokenMetadata;
use mirror_core::{MirrorError, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::chain::ChainClient;

pub struct FakeChain {
    height: AtomicU64,
    heights: broadcast::Sender<u64>,
    subscriptions: AtomicUsize,
    fail_heights: AtomicBool,
    factory_pools: Mutex<Vec<Address>>,
    events: Mutex<HashMap<(Address, EventKind), Vec<(u64, ChainEvent)>>>,
    tokens: Mutex<HashMap<Address, TokenMetadata>>,
    assets: Mutex<HashMap<Address, (Address, Address)>>,
    prices: Mutex<HashMap<Address, U256>>,
    failing: Mutex<HashSet<(Address, EventKind)>>,
    queries: Mutex<Vec<(Address, EventKind, u64, u64)>>,
}

impl FakeChain {
    pub fn new(height: u64) -> Self {
        let (heights, _) = broadcast::channel(64);
        Self {
            height: AtomicU64::new(height),
            heights,
            subscriptions: AtomicUsize::new(0),
            fail_heights: AtomicBool::new(false),
            factory_pools: Mutex::new(Vec::new()),
            events: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
            assets: Mutex::new(HashMap::new()),
            prices: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Advance the chain and notify subscribers
    pub fn push_height(&self, height: u64) {
        self.set_height(height);
        let _ = self.heights.send(height);
    }

    /// Live receivers of pushed heights
    pub fn subscriber_count(&self) -> usize {
        self.heights.receiver_count()
    }

    /// Calls to `subscribe_new_heights` so far
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Make `current_height` fail, as a dead endpoint would
    pub fn fail_heights(&self, fail: bool) {
        self.fail_heights.store(fail, Ordering::SeqCst);
    }

    pub fn add_token(&self, address: Address, symbol: &str, decimals: u8) {
        self.tokens.lock().insert(
            address,
            TokenMetadata {
                address: address.to_string(),
                name: format!("{} Token", symbol),
                symbol: symbol.to_string(),
                decimals,
            },
        );
    }

    /// Register a pool's assets and price without listing it on the factory
    pub fn deploy_pool(&self, pool: Address, base: Address, quote: Address, price: U256) {
        self.assets.lock().insert(pool, (base, quote));
        self.prices.lock().insert(pool, price);
    }

    /// Make a deployed pool enumerable through the factory getters
    pub fn list_pool(&self, pool: Address) {
        self.factory_pools.lock().push(pool);
    }

    pub fn emit(&self, contract: Address, block: u64, event: ChainEvent) {
        self.events
            .lock()
            .entry((contract, event.kind()))
            .or_default()
            .push((block, event));
    }

    pub fn fail_queries(&self, contract: Address, kind: EventKind, fail: bool) {
        let mut failing = self.failing.lock();
        if fail {
            failing.insert((contract, kind));
        } else {
            failing.remove(&(contract, kind));
        }
    }

    /// Ranges queried for one contract and kind, in call order
    pub fn queried_ranges(&self, contract: Address, kind: EventKind) -> Vec<(u64, u64)> {
        self.queries
            .lock()
            .iter()
            .filter(|(c, k, _, _)| *c == contract && *k == kind)
            .map(|(_, _, from, to)| (*from, *to))
            .collect()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn current_height(&self) -> Result<u64> {
        if self.fail_heights.load(Ordering::SeqCst) {
            return Err(MirrorError::Rpc("eth_blockNumber: connection refused".to_string()));
        }
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn subscribe_new_heights(&self) -> Result<BoxStream<'static, u64>> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let receiver = self.heights.subscribe();
        let heights = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(height) => return Some((height, receiver)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(heights.boxed())
    }

    async fn pool_count(&self, _factory: Address) -> Result<u64> {
        Ok(self.factory_pools.lock().len() as u64)
    }

    async fn pool_at_index(&self, _factory: Address, index: u64) -> Result<Address> {
        self.factory_pools
            .lock()
            .get(index as usize)
            .copied()
            .ok_or_else(|| MirrorError::Rpc(format!("no pool at index {}", index)))
    }

    async fn query_events(
        &self,
        contract: Address,
        kind: EventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainEvent>> {
        self.queries.lock().push((contract, kind, from_block, to_block));

        if self.failing.lock().contains(&(contract, kind)) {
            return Err(MirrorError::Rpc(format!("{} query failed", kind.as_str())));
        }

        Ok(self
            .events
            .lock()
            .get(&(contract, kind))
            .map(|events| {
                events
                    .iter()
                    .filter(|(block, _)| *block >= from_block && *block <= to_block)
                    .map(|(_, event)| event.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn asset_metadata(&self, asset: Address) -> Result<TokenMetadata> {
        self.tokens
            .lock()
            .get(&asset)
            .cloned()
            .ok_or_else(|| MirrorError::Rpc(format!("unknown asset {}", asset)))
    }

    async fn pool_assets(&self, pool: Address) -> Result<(Address, Address)> {
        self.assets
            .lock()
            .get(&pool)
            .copied()
            .ok_or_else(|| MirrorError::Rpc(format!("unknown pool {}", pool)))
    }

    async fn last_price(&self, pool: Address) -> Result<U256> {
        self.prices
            .lock()
            .get(&pool)
            .copied()
            .ok_or_else(|| MirrorError::Rpc(format!("unknown pool {}", pool)))
    }
}
