use metrics::{describe_gauge, gauge};

/// Initialize gauge descriptions
pub fn init() {
    describe_gauge!(
        "mirror_watermark_block",
        "Highest block height the scheduler has completed a round for"
    );
    describe_gauge!("mirror_pools", "Number of replicated pools");
    describe_gauge!("mirror_consumers", "Number of registered block consumers");
    describe_gauge!(
        "mirror_pool_cursor_block",
        "Last block applied to a pool's order book"
    );
}

pub fn set_watermark(block: u64) {
    gauge!("mirror_watermark_block").set(block as f64);
}

pub fn set_pools(count: usize) {
    gauge!("mirror_pools").set(count as f64);
}

pub fn set_consumers(count: usize) {
    gauge!("mirror_consumers").set(count as f64);
}

pub fn set_pool_cursor(pool: &str, block: u64) {
    gauge!("mirror_pool_cursor_block", "pool" => pool.to_string()).set(block as f64);
}
