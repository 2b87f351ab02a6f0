use alloy_sol_types::sol;

sol! {
    /// Emitted by the factory when a new order-book pool is deployed
    #[derive(Debug)]
    event PoolCreated(address indexed pool);
}
