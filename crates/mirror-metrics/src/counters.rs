use metrics::{counter, describe_counter};

/// Initialize counter descriptions
pub fn init() {
    describe_counter!(
        "mirror_block_rounds_total",
        "Block rounds completed by the scheduler"
    );
    describe_counter!(
        "mirror_block_rounds_skipped_total",
        "Height notifications skipped (busy or stale)"
    );
    describe_counter!(
        "mirror_events_applied_total",
        "Chain events applied to order books"
    );
    describe_counter!(
        "mirror_pools_discovered_total",
        "Pools added to the registry"
    );
    describe_counter!(
        "mirror_consumer_failures_total",
        "Block consumers that failed or timed out within a round"
    );
    describe_counter!(
        "mirror_persistence_errors_total",
        "Failed write-through persistence operations"
    );
    describe_counter!(
        "mirror_resubscriptions_total",
        "Times the block feed was re-established"
    );
}

pub fn block_rounds(count: u64) {
    counter!("mirror_block_rounds_total").increment(count);
}

/// `reason` is `busy` or `stale`
pub fn block_round_skipped(reason: &'static str) {
    counter!("mirror_block_rounds_skipped_total", "reason" => reason).increment(1);
}

pub fn events_applied(count: u64, kind: &'static str) {
    counter!("mirror_events_applied_total", "kind" => kind).increment(count);
}

pub fn pools_discovered(count: u64) {
    counter!("mirror_pools_discovered_total").increment(count);
}

pub fn consumer_failures(count: u64) {
    counter!("mirror_consumer_failures_total").increment(count);
}

pub fn persistence_errors(count: u64) {
    counter!("mirror_persistence_errors_total").increment(count);
}

pub fn resubscriptions(count: u64) {
    counter!("mirror_resubscriptions_total").increment(count);
}
