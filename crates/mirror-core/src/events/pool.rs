use alloy_sol_types::sol;

sol! {
    /// Emitted when a limit order starts resting on the book
    /// Note: orderType is 0 for buy, anything else for sell
    #[derive(Debug)]
    event OrderCreated(
        address indexed trader,
        uint256 indexed orderId,
        uint256 price,
        uint256 amount,
        uint8 orderType
    );

    /// Emitted when a resting order is (partially) filled
    #[derive(Debug)]
    event OrderFilled(
        uint256 indexed orderId,
        address indexed trader,
        uint256 filledAmount,
        uint256 remainingAmount,
        uint8 orderType
    );

    /// Emitted when a resting order is cancelled by its owner
    #[derive(Debug)]
    event OrderCancelled(uint256 indexed orderId);

    /// Emitted when the owner amends the size of a resting order
    #[derive(Debug)]
    event OrderUpdated(
        uint256 indexed orderId,
        address indexed trader,
        uint256 newAmount
    );

    /// Emitted when the pool's last trade price moves
    #[derive(Debug)]
    event LatestPriceUpdated(uint256 price);

    /// Emitted when a market order executes against the book
    #[derive(Debug)]
    event MarketOrderExecuted(
        address indexed trader,
        uint256 amount,
        uint256 price,
        uint8 orderType,
        uint256 filledAmount
    );
}
