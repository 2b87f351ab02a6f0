use mirror_api::{ApiConfig, ApiServer, PoolDirectory};
use mirror_core::types::MirrorNotification;
use mirror_core::MirrorConfig;
use mirror_metrics::{MetricsConfig, MetricsServer};
use mirror_redis::{NotificationPublisher, RedisConfig, RedisConnection, RedisKeyValueStore};
use mirror_store::KeyValueStore;
use mirror_sync::{AlloyChainClient, BlockScheduler, ChainClient, PoolRegistry, ReplicatorContext};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Notification buffer when Redis does not configure one
const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("mirror_sync=info".parse()?),
        )
        .init();

    info!("CLOB mirror starting...");

    let config = match MirrorConfig::load() {
        Ok(config) => {
            info!(
                factory = %config.factory_address,
                start_block = config.replication.start_block,
                log_batch_size = config.replication.log_batch_size,
                failure_policy = ?config.replication.failure_policy,
                persistence = config.persistence_enabled(),
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received (Ctrl+C)");
        shutdown_tx_clone.send(()).ok();
    });

    let metrics_config = MetricsConfig::from_env();
    if metrics_config.enabled {
        let handle = mirror_metrics::init()?;
        let metrics_server = MetricsServer::new(metrics_config, handle);
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = metrics_server.run(shutdown).await {
                error!(error = %e, "Metrics server error");
            }
        });
        info!("Metrics server started");
    }

    let redis_config = config.redis_url.clone().map(RedisConfig::from_env);
    let capacity = redis_config
        .as_ref()
        .map(|c| c.queue_capacity)
        .unwrap_or(DEFAULT_NOTIFICATION_CAPACITY);
    let (notifications, _) = broadcast::channel::<MirrorNotification>(capacity.max(1));

    // Redis is optional; without it the mirror runs memory-only
    let store: Option<Arc<dyn KeyValueStore>> = match redis_config {
        Some(redis_config) => {
            let publish = redis_config.publish_notifications;
            match RedisConnection::new(redis_config).await {
                Ok(conn) => {
                    let conn = Arc::new(conn);
                    if publish {
                        NotificationPublisher::new(Arc::clone(&conn))
                            .spawn(notifications.subscribe(), shutdown_tx.subscribe());
                    }
                    info!(queue_capacity = capacity, "Redis connected for persistence");
                    Some(Arc::new(RedisKeyValueStore::new(conn)) as Arc<dyn KeyValueStore>)
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect to Redis");
                    std::process::exit(1);
                }
            }
        }
        None => {
            warn!("REDIS_URL not set, running without persistence");
            None
        }
    };

    let chain: Arc<dyn ChainClient> =
        Arc::new(AlloyChainClient::new(&config.rpc_url, config.poll_interval)?);

    let scheduler = Arc::new(BlockScheduler::new(Arc::clone(&chain), config.scheduler.clone()));
    let scheduler_task = scheduler.start(shutdown_tx.subscribe()).await?;

    let ctx = ReplicatorContext {
        chain,
        config: config.replication.clone(),
        store,
        notifications,
    };
    let registry = Arc::new(PoolRegistry::new(
        config.factory_address,
        ctx,
        Arc::clone(&scheduler),
    ));
    registry.start().await?;

    let api_server = ApiServer::new(
        ApiConfig::from_env(),
        Arc::clone(&registry) as Arc<dyn PoolDirectory>,
    );
    let shutdown = shutdown_tx.subscribe();
    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run(shutdown).await {
            error!(error = %e, "API server error");
        }
    });

    info!(pools = registry.count(), "CLOB mirror running");

    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Block scheduler task failed");
    }
    api_task.await.ok();

    info!(
        pools = registry.count(),
        watermark = scheduler.watermark(),
        "CLOB mirror shutdown complete"
    );
    Ok(())
}
