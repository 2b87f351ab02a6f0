pub mod config;
pub mod error;
pub mod events;
pub mod types;
pub mod units;

pub use config::{CursorFailurePolicy, MirrorConfig, ReplicationConfig, SchedulerConfig};
pub use error::{MirrorError, Result};
