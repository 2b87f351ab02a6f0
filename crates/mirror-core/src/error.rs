use alloy_primitives::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Event decode error: {0}")]
    EventDecode(String),

    #[error("Pool not found: {0}")]
    PoolNotFound(Address),

    #[error("Order not found: pool={0}, order_id={1}")]
    OrderNotFound(Address, String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timed out after {0}s")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, MirrorError>;
