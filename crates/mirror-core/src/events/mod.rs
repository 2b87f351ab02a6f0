pub mod factory;
pub mod pool;

mod decoded;

pub use decoded::{ChainEvent, EventKind};
pub use factory::*;
pub use pool::*;
