use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use alloy::sol;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use mirror_core::events::{ChainEvent, EventKind};
use mirror_core::types::TokenMetadata;
use mirror_core::{MirrorError, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::chain::ChainClient;

sol! {
    #[sol(rpc)]
    interface IPoolFactory {
        function getPoolCount() external view returns (uint256);
        function getPoolByIndex(uint256 index) external view returns (address);
    }

    #[sol(rpc)]
    interface IOrderBookPool {
        function getBaseToken() external view returns (address);
        function getQuoteToken() external view returns (address);
        function getLatestPrice() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IERC20Metadata {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}

/// Attempts per RPC call before the error is surfaced
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// JSON-RPC chain client over HTTP
#[derive(Clone)]
pub struct AlloyChainClient {
    provider: DynProvider<Ethereum>,
    poll_interval: Duration,
}

impl AlloyChainClient {
    pub fn new(rpc_url: &str, poll_interval: Duration) -> Result<Self> {
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| MirrorError::Rpc(format!("Invalid RPC URL: {}", e)))?;

        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            provider,
            poll_interval,
        })
    }
}

/// Check if an RPC error message looks transient (rate limits, timeouts, dropped connections)
fn is_transient(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("rate limit")
        || msg.contains("too many requests")
        || msg.contains("429")
        || msg.contains("timeout")
        || msg.contains("timed out")
        || msg.contains("connection")
        || msg.contains("error sending request")
        || msg.contains("broken pipe")
        || msg.contains("reset by peer")
        || msg.contains("eof")
}

/// Run an RPC call, retrying transient failures with capped exponential backoff
async fn with_retry<T, F, Fut>(method: &'static str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, String>>,
{
    let mut attempts = 0u32;
    let mut delay = RETRY_DELAY;

    loop {
        attempts += 1;
        let start = Instant::now();
        let result = call().await;
        mirror_metrics::histograms::rpc_request_duration(start.elapsed(), method);

        match result {
            Ok(value) => return Ok(value),
            Err(msg) if attempts < MAX_ATTEMPTS && is_transient(&msg) => {
                warn!(
                    method = method,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    error = %msg,
                    "RPC call failed, retrying with backoff"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
            Err(msg) => return Err(MirrorError::Rpc(format!("{}: {}", method, msg))),
        }
    }
}

fn index_to_u64(value: U256, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| MirrorError::Rpc(format!("{} out of range: {}", what, value)))
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn current_height(&self) -> Result<u64> {
        with_retry("eth_blockNumber", || async {
            self.provider.get_block_number().await.map_err(|e| e.to_string())
        })
        .await
    }

    async fn subscribe_new_heights(&self) -> Result<BoxStream<'static, u64>> {
        let start = self.current_height().await?;
        let provider = self.provider.clone();
        let interval = self.poll_interval;

        debug!(from = start, interval_ms = interval.as_millis(), "Polling for new block heights");

        let heights = stream::unfold((provider, start), move |(provider, last)| async move {
            loop {
                tokio::time::sleep(interval).await;
                match provider.get_block_number().await {
                    Ok(height) if height > last => return Some((height, (provider, height))),
                    Ok(_) => continue,
                    Err(e) => {
                        // ending the stream makes the scheduler resubscribe
                        warn!(error = %e, "Block height poll failed, ending feed");
                        return None;
                    }
                }
            }
        });

        Ok(heights.boxed())
    }

    async fn pool_count(&self, factory: Address) -> Result<u64> {
        let contract = IPoolFactory::new(factory, self.provider.clone());
        let count = with_retry("getPoolCount", || async {
            contract.getPoolCount().call().await.map_err(|e| e.to_string())
        })
        .await?;
        index_to_u64(count, "pool count")
    }

    async fn pool_at_index(&self, factory: Address, index: u64) -> Result<Address> {
        let contract = IPoolFactory::new(factory, self.provider.clone());
        with_retry("getPoolByIndex", || async {
            contract
                .getPoolByIndex(U256::from(index))
                .call()
                .await
                .map_err(|e| e.to_string())
        })
        .await
    }

    async fn query_events(
        &self,
        contract: Address,
        kind: EventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainEvent>> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(kind.signature_hash())
            .from_block(from_block)
            .to_block(to_block);

        let logs = with_retry("eth_getLogs", || async {
            // Debug format keeps the full error chain including response details
            self.provider.get_logs(&filter).await.map_err(|e| format!("{:?}", e))
        })
        .await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match ChainEvent::decode(kind, &log.inner) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    contract = %contract,
                    block = ?log.block_number,
                    tx = ?log.transaction_hash,
                    error = %e,
                    "Skipping undecodable log"
                ),
            }
        }

        if !events.is_empty() {
            debug!(
                event = kind.as_str(),
                contract = %contract,
                from = from_block,
                to = to_block,
                count = events.len(),
                "Fetched event logs"
            );
        }

        Ok(events)
    }

    async fn asset_metadata(&self, asset: Address) -> Result<TokenMetadata> {
        let token = IERC20Metadata::new(asset, self.provider.clone());

        let (name, symbol, decimals) = tokio::try_join!(
            with_retry("name", || async { token.name().call().await.map_err(|e| e.to_string()) }),
            with_retry("symbol", || async { token.symbol().call().await.map_err(|e| e.to_string()) }),
            with_retry("decimals", || async { token.decimals().call().await.map_err(|e| e.to_string()) }),
        )?;

        Ok(TokenMetadata {
            address: asset.to_string(),
            name,
            symbol,
            decimals,
        })
    }

    async fn pool_assets(&self, pool: Address) -> Result<(Address, Address)> {
        let contract = IOrderBookPool::new(pool, self.provider.clone());
        tokio::try_join!(
            with_retry("getBaseToken", || async {
                contract.getBaseToken().call().await.map_err(|e| e.to_string())
            }),
            with_retry("getQuoteToken", || async {
                contract.getQuoteToken().call().await.map_err(|e| e.to_string())
            }),
        )
    }

    async fn last_price(&self, pool: Address) -> Result<U256> {
        let contract = IOrderBookPool::new(pool, self.provider.clone());
        with_retry("getLatestPrice", || async {
            contract.getLatestPrice().call().await.map_err(|e| e.to_string())
        })
        .await
    }
}
