use crate::error::{MirrorError, Result};
use alloy_primitives::Address;
use std::env;
use std::time::Duration;

/// What a consumer does with its cursor when a block round fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorFailurePolicy {
    /// Keep the cursor where it was; the next round re-covers the failed range
    #[default]
    Retry,
    /// Advance past the failed range anyway (events in it are lost)
    BestEffort,
}

impl CursorFailurePolicy {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "retry" => Ok(Self::Retry),
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            other => Err(MirrorError::InvalidConfig(format!(
                "CURSOR_FAILURE_POLICY must be 'retry' or 'best_effort', got '{}'",
                other
            ))),
        }
    }
}

/// Block scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between liveness probes of the chain client
    pub liveness_interval: Duration,
    /// First delay before re-subscribing after a failed probe
    pub reconnect_backoff: Duration,
    /// Upper bound for the doubling reconnect delay
    pub reconnect_backoff_max: Duration,
    /// Optional deadline for a single consumer within one round
    pub consumer_timeout: Option<Duration>,
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let liveness_secs = env_or("LIVENESS_INTERVAL_SECS", 30u64);
        let backoff_ms = env_or("RECONNECT_BACKOFF_MS", 5000u64);
        let backoff_max_ms = env_or("RECONNECT_BACKOFF_MAX_MS", 60_000u64);
        let consumer_timeout = env::var("CONSUMER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            liveness_interval: Duration::from_secs(liveness_secs),
            reconnect_backoff: Duration::from_millis(backoff_ms),
            reconnect_backoff_max: Duration::from_millis(backoff_max_ms.max(backoff_ms)),
            consumer_timeout,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            liveness_interval: Duration::from_secs(30),
            reconnect_backoff: Duration::from_millis(5000),
            reconnect_backoff_max: Duration::from_millis(60_000),
            consumer_timeout: None,
        }
    }
}

/// Replication (per-pool and discovery) configuration
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// First block a freshly created replicator scans
    pub start_block: u64,
    /// Maximum number of blocks per log query
    pub log_batch_size: u64,
    pub failure_policy: CursorFailurePolicy,
}

impl ReplicationConfig {
    pub fn from_env() -> Result<Self> {
        let failure_policy = match env::var("CURSOR_FAILURE_POLICY") {
            Ok(value) => CursorFailurePolicy::parse(&value)?,
            Err(_) => CursorFailurePolicy::default(),
        };

        Ok(Self {
            start_block: env_or("START_BLOCK", 0u64),
            log_batch_size: env_or("LOG_BATCH_SIZE", 2000u64).max(1),
            failure_policy,
        })
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            log_batch_size: 2000,
            failure_policy: CursorFailurePolicy::Retry,
        }
    }
}

/// Complete mirror configuration
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub rpc_url: String,
    pub factory_address: Address,
    /// How often the JSON-RPC client polls for a new chain height
    pub poll_interval: Duration,
    pub redis_url: Option<String>,
    pub scheduler: SchedulerConfig,
    pub replication: ReplicationConfig,
}

impl MirrorConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let rpc_url = sanitize_url(
            env::var("RPC_URL").map_err(|_| MirrorError::MissingEnvVar("RPC_URL".to_string()))?,
        );

        let factory_address = env::var("FACTORY_ADDRESS")
            .map_err(|_| MirrorError::MissingEnvVar("FACTORY_ADDRESS".to_string()))?
            .trim()
            .parse::<Address>()
            .map_err(|e| MirrorError::InvalidConfig(format!("FACTORY_ADDRESS: {}", e)))?;

        let redis_url = env::var("REDIS_URL")
            .ok()
            .map(sanitize_url)
            .filter(|url| !url.is_empty());

        Ok(Self {
            rpc_url,
            factory_address,
            poll_interval: Duration::from_millis(env_or("POLL_INTERVAL_MS", 1000u64)),
            redis_url,
            scheduler: SchedulerConfig::from_env(),
            replication: ReplicationConfig::from_env()?,
        })
    }

    /// Persistence mode is enabled when a Redis URL is configured
    pub fn persistence_enabled(&self) -> bool {
        self.redis_url.is_some()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Sanitize URL by removing surrounding quotes and whitespace
pub fn sanitize_url(url: String) -> String {
    let trimmed = url.trim();
    let without_quotes = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    without_quotes.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_url() {
        assert_eq!(sanitize_url(" \"http://node:8545\" ".to_string()), "http://node:8545");
        assert_eq!(sanitize_url("'ws://node'".to_string()), "ws://node");
        assert_eq!(sanitize_url("http://plain".to_string()), "http://plain");
        assert_eq!(sanitize_url("\"".to_string()), "\"");
    }

    #[test]
    fn test_cursor_failure_policy_parse() {
        assert_eq!(CursorFailurePolicy::parse("retry").unwrap(), CursorFailurePolicy::Retry);
        assert_eq!(
            CursorFailurePolicy::parse(" Best_Effort ").unwrap(),
            CursorFailurePolicy::BestEffort
        );
        assert!(CursorFailurePolicy::parse("skip").is_err());
    }
}
