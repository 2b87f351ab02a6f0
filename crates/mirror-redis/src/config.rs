use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Publish pool/order-book notifications over Redis pub/sub
    #[serde(default = "default_publish")]
    pub publish_notifications: bool,

    /// Notifications buffered for subscribers before the slowest one lags
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Notifications sent per pipeline
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Keys fetched per SCAN iteration
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
}

fn default_publish() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_batch_size() -> usize {
    100
}

fn default_scan_count() -> usize {
    500
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            publish_notifications: default_publish(),
            queue_capacity: default_queue_capacity(),
            batch_size: default_batch_size(),
            scan_count: default_scan_count(),
        }
    }

    /// Build from environment, with `url` taken from the already loaded mirror config
    pub fn from_env(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            publish_notifications: std::env::var("REDIS_PUBLISH_NOTIFICATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_publish),
            queue_capacity: std::env::var("REDIS_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_queue_capacity),
            batch_size: std::env::var("REDIS_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_batch_size),
            scan_count: std::env::var("REDIS_SCAN_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_scan_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RedisConfig::new("redis://localhost:6379");
        assert!(config.publish_notifications);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.scan_count, 500);
    }
}
