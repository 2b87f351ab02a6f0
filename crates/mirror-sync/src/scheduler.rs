use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;
use mirror_core::{MirrorError, Result, SchedulerConfig};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::select;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;

/// Something that catches its own state up to a chain height
#[async_trait]
pub trait BlockConsumer: Send + Sync {
    /// Process everything the consumer has not seen up to and including `height`
    async fn process_block(&self, height: u64) -> Result<()>;
}

/// What happened to one height notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// All consumers were invoked; `failures` of them reported an error
    Completed { consumers: usize, failures: usize },
    /// Another round was in flight
    Busy,
    /// Height at or below the watermark
    Stale,
}

/// Clears the in-flight flag even if a consumer panics
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fans new chain heights out to registered consumers, one round at a time
pub struct BlockScheduler {
    chain: Arc<dyn ChainClient>,
    config: SchedulerConfig,
    consumers: RwLock<HashMap<String, Arc<dyn BlockConsumer>>>,
    watermark: AtomicU64,
    processing: AtomicBool,
}

impl BlockScheduler {
    pub fn new(chain: Arc<dyn ChainClient>, config: SchedulerConfig) -> Self {
        Self {
            chain,
            config,
            consumers: RwLock::new(HashMap::new()),
            watermark: AtomicU64::new(0),
            processing: AtomicBool::new(false),
        }
    }

    /// Add or replace a named consumer
    pub fn register_consumer(&self, id: impl Into<String>, consumer: Arc<dyn BlockConsumer>) {
        let id = id.into();
        let count = {
            let mut consumers = self.consumers.write();
            consumers.insert(id.clone(), consumer);
            consumers.len()
        };
        mirror_metrics::gauges::set_consumers(count);
        debug!(consumer = %id, total = count, "Block consumer registered");
    }

    /// Returns false if no consumer had this id
    pub fn unregister_consumer(&self, id: &str) -> bool {
        let (removed, count) = {
            let mut consumers = self.consumers.write();
            let removed = consumers.remove(id).is_some();
            (removed, consumers.len())
        };
        mirror_metrics::gauges::set_consumers(count);
        if removed {
            debug!(consumer = %id, total = count, "Block consumer unregistered");
        }
        removed
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.read().len()
    }

    /// Highest height a round has completed for
    pub fn watermark(&self) -> u64 {
        self.watermark.load(Ordering::Acquire)
    }

    /// Set the watermark to the current chain height and spawn the feed loop.
    ///
    /// Consumers registered afterwards start from that height, not from genesis.
    pub async fn start(self: &Arc<Self>, shutdown: broadcast::Receiver<()>) -> Result<JoinHandle<()>> {
        let height = self.chain.current_height().await?;
        self.watermark.store(height, Ordering::Release);
        mirror_metrics::gauges::set_watermark(height);

        info!(
            watermark = height,
            liveness_secs = self.config.liveness_interval.as_secs(),
            "Block scheduler started"
        );

        let scheduler = Arc::clone(self);
        Ok(tokio::spawn(async move { scheduler.run(shutdown).await }))
    }

    /// Handle one height notification.
    ///
    /// Dropped while another round is in flight; ignored at or below the
    /// watermark. Otherwise runs every consumer concurrently and then advances
    /// the watermark, whatever the consumers reported.
    pub async fn on_new_height(&self, height: u64) -> RoundOutcome {
        if height <= self.watermark() {
            mirror_metrics::counters::block_round_skipped("stale");
            return RoundOutcome::Stale;
        }

        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(height = height, "Round in flight, dropping notification");
            mirror_metrics::counters::block_round_skipped("busy");
            return RoundOutcome::Busy;
        }
        let _guard = InFlight(&self.processing);

        // watermark may have moved while we raced for the flag
        if height <= self.watermark() {
            mirror_metrics::counters::block_round_skipped("stale");
            return RoundOutcome::Stale;
        }

        let start = Instant::now();
        let (consumers, failures) = self.run_round(height).await;

        self.watermark.fetch_max(height, Ordering::AcqRel);
        mirror_metrics::gauges::set_watermark(height);
        mirror_metrics::counters::block_rounds(1);
        mirror_metrics::histograms::block_round_duration(start.elapsed());

        debug!(
            height = height,
            consumers = consumers,
            failures = failures,
            duration_ms = start.elapsed().as_millis(),
            "Block round complete"
        );

        RoundOutcome::Completed { consumers, failures }
    }

    async fn run_round(&self, height: u64) -> (usize, usize) {
        let snapshot: Vec<(String, Arc<dyn BlockConsumer>)> = self
            .consumers
            .read()
            .iter()
            .map(|(id, consumer)| (id.clone(), Arc::clone(consumer)))
            .collect();

        let timeout = self.config.consumer_timeout;
        let calls = snapshot.iter().map(|(id, consumer)| async move {
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, consumer.process_block(height)).await {
                    Ok(result) => result,
                    Err(_) => Err(MirrorError::Timeout(limit.as_secs())),
                },
                None => consumer.process_block(height).await,
            };
            (id, result)
        });

        let mut failures = 0;
        for (id, result) in join_all(calls).await {
            if let Err(e) = result {
                failures += 1;
                error!(consumer = %id, height = height, error = %e, "Block consumer failed");
            }
        }

        if failures > 0 {
            mirror_metrics::counters::consumer_failures(failures as u64);
        }

        (snapshot.len(), failures)
    }

    /// Supervised feed loop: subscribe, dispatch heights, probe liveness,
    /// resubscribe with capped exponential backoff when the feed is lost.
    /// Rounds still in flight at shutdown are awaited before returning.
    async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut backoff = self.config.reconnect_backoff;
        let mut rounds = JoinSet::new();

        'supervisor: loop {
            match self.chain.subscribe_new_heights().await {
                Ok(mut heights) => {
                    let mut probe = tokio::time::interval(self.config.liveness_interval);
                    // first tick fires immediately
                    probe.tick().await;

                    loop {
                        select! {
                            _ = shutdown.recv() => break 'supervisor,
                            next = heights.next() => match next {
                                Some(height) => {
                                    let scheduler = Arc::clone(&self);
                                    rounds.spawn(async move {
                                        scheduler.on_new_height(height).await;
                                    });
                                }
                                None => {
                                    warn!("Block feed ended");
                                    break;
                                }
                            },
                            Some(_) = rounds.join_next(), if !rounds.is_empty() => {}
                            _ = probe.tick() => match self.chain.current_height().await {
                                Ok(height) => {
                                    backoff = self.config.reconnect_backoff;
                                    debug!(height = height, watermark = self.watermark(), "Liveness probe ok");
                                }
                                Err(e) => {
                                    warn!(error = %e, "Liveness probe failed, dropping subscription");
                                    break;
                                }
                            },
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to subscribe to new block heights");
                }
            }

            info!(delay_ms = backoff.as_millis(), "Resubscribing to block feed after backoff");
            select! {
                _ = shutdown.recv() => break 'supervisor,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = next_backoff(backoff, self.config.reconnect_backoff_max);
            mirror_metrics::counters::resubscriptions(1);
        }

        if !rounds.is_empty() {
            debug!(rounds = rounds.len(), "Waiting for in-flight rounds");
        }
        while rounds.join_next().await.is_some() {}

        info!(watermark = self.watermark(), "Block scheduler stopped");
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}
