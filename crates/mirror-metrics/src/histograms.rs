use metrics::{describe_histogram, histogram};
use std::time::Duration;

/// Initialize histogram descriptions
pub fn init() {
    describe_histogram!(
        "mirror_block_round_duration_seconds",
        "Time for one scheduler round across all consumers"
    );
    describe_histogram!(
        "mirror_pool_sync_duration_seconds",
        "Time for one replicator window (fetch and apply)"
    );
    describe_histogram!(
        "mirror_rpc_request_duration_seconds",
        "Time for RPC requests"
    );
}

pub fn block_round_duration(duration: Duration) {
    histogram!("mirror_block_round_duration_seconds").record(duration.as_secs_f64());
}

pub fn pool_sync_duration(duration: Duration) {
    histogram!("mirror_pool_sync_duration_seconds").record(duration.as_secs_f64());
}

pub fn rpc_request_duration(duration: Duration, method: &'static str) {
    histogram!("mirror_rpc_request_duration_seconds", "method" => method)
        .record(duration.as_secs_f64());
}
