mod kv;
mod order_book;
mod persistence;

pub use kv::{KeyValueStore, KvWrite, MemoryKeyValueStore};
pub use order_book::{BookChanges, OrderBookStore, INSUFFICIENT_LIQUIDITY, INVALID_AMOUNT, NO_LIQUIDITY};
pub use persistence::{load_all_pools, pool_info_key, BookPersistence};
