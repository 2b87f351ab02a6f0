use crate::channels::{orderbook_channel, POOLS_CHANNEL};
use crate::connection::RedisConnection;
use crate::Result;
use mirror_core::types::MirrorNotification;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Channel a notification is published on
pub fn channel_for(notification: &MirrorNotification) -> String {
    match notification {
        MirrorNotification::PoolCreated { .. } => POOLS_CHANNEL.to_string(),
        MirrorNotification::OrderBookUpdated { pool_address, .. } => orderbook_channel(pool_address),
    }
}

/// Forwards mirror notifications to Redis pub/sub in pipelined batches
pub struct NotificationPublisher {
    connection: Arc<RedisConnection>,
}

impl NotificationPublisher {
    pub fn new(connection: Arc<RedisConnection>) -> Self {
        Self { connection }
    }

    /// Spawn the forwarding loop. Ends when the notification channel closes or on shutdown.
    pub fn spawn(
        self,
        mut receiver: broadcast::Receiver<MirrorNotification>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let batch_size = self.connection.config().batch_size.max(1);
        info!(batch_size = batch_size, "Redis notification publisher started");

        tokio::spawn(async move {
            let mut batch: Vec<MirrorNotification> = Vec::with_capacity(batch_size);

            loop {
                batch.clear();

                let first = tokio::select! {
                    _ = shutdown.recv() => {
                        info!("Redis notification publisher shutting down");
                        break;
                    }
                    received = receiver.recv() => received,
                };

                match first {
                    Ok(notification) => batch.push(notification),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Notification publisher lagged, dropping notifications");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }

                // Collect more without blocking
                while batch.len() < batch_size {
                    match receiver.try_recv() {
                        Ok(notification) => batch.push(notification),
                        Err(TryRecvError::Lagged(skipped)) => {
                            warn!(skipped = skipped, "Notification publisher lagged, dropping notifications");
                        }
                        Err(_) => break,
                    }
                }

                if let Err(e) = self.publish_batch(&batch).await {
                    error!(error = %e, batch_size = batch.len(), "Failed to publish notifications to Redis");
                }
            }
        })
    }

    async fn publish_batch(&self, batch: &[MirrorNotification]) -> Result<()> {
        let mut conn = self.connection.get_connection();
        let mut pipe = redis::pipe();

        for notification in batch {
            pipe.cmd("PUBLISH")
                .arg(channel_for(notification))
                .arg(serde_json::to_string(notification)?)
                .ignore();
        }

        pipe.query_async::<()>(&mut conn).await?;
        debug!(batch_size = batch.len(), "Published notification batch to Redis");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_for() {
        let created = MirrorNotification::PoolCreated {
            pool_address: "0xpool".to_string(),
        };
        let updated = MirrorNotification::OrderBookUpdated {
            pool_address: "0xpool".to_string(),
            block: 5,
        };
        assert_eq!(channel_for(&created), "pools");
        assert_eq!(channel_for(&updated), "orderbook:0xpool");
    }
}
