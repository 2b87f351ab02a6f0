pub mod channels;
pub mod config;
pub mod connection;
pub mod publisher;
pub mod store;

pub use config::RedisConfig;
pub use connection::RedisConnection;
pub use publisher::NotificationPublisher;
pub use store::RedisKeyValueStore;

use mirror_core::MirrorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedisError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for RedisError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_io_error() || err.is_connection_refusal() {
            RedisError::Connection(err.to_string())
        } else {
            RedisError::Command(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RedisError {
    fn from(err: serde_json::Error) -> Self {
        RedisError::Serialization(err.to_string())
    }
}

impl From<RedisError> for MirrorError {
    fn from(err: RedisError) -> Self {
        MirrorError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RedisError>;
