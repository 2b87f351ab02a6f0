use mirror_core::types::{
    AmountOutResult, MarketOrder, Order, OrderBookSnapshot, OrderType, PoolInfo, PriceLevel,
    TokenMetadata,
};
use mirror_core::units::{format_amount, parse_amount};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

pub const NO_LIQUIDITY: &str = "No liquidity available";
pub const INSUFFICIENT_LIQUIDITY: &str = "Insufficient liquidity";
pub const INVALID_AMOUNT: &str = "Invalid amount";

/// Price bucket key: ordered numerically, keyed by the exact decimal string
#[derive(Debug, Clone)]
struct PriceKey {
    value: f64,
    text: String,
}

impl PriceKey {
    fn new(text: &str) -> Self {
        Self {
            value: parse_amount(text),
            text: text.to_string(),
        }
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PriceKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriceKey {}

/// Keys touched by mutations since the last `take_changes`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookChanges {
    pub orders: BTreeSet<String>,
    pub traders: BTreeSet<String>,
    pub market_traders: BTreeSet<String>,
    pub price_buckets: BTreeSet<(OrderType, String)>,
    pub sides: BTreeSet<OrderType>,
    pub latest_price: bool,
}

impl BookChanges {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
            && self.traders.is_empty()
            && self.market_traders.is_empty()
            && self.price_buckets.is_empty()
            && !self.latest_price
    }

    /// Fold `other` into this record of touched keys
    pub fn merge(&mut self, other: BookChanges) {
        self.orders.extend(other.orders);
        self.traders.extend(other.traders);
        self.market_traders.extend(other.market_traders);
        self.price_buckets.extend(other.price_buckets);
        self.sides.extend(other.sides);
        self.latest_price |= other.latest_price;
    }
}

/// A trader's order ids in first-seen order
#[derive(Debug, Default)]
struct TraderOrders {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl TraderOrders {
    fn insert(&mut self, id: &str) {
        if self.seen.insert(id.to_string()) {
            self.ids.push(id.to_string());
        }
    }
}

/// Order book of a single pool.
///
/// Orders live in one arena keyed by id; every other index stores ids only, so
/// evicting an order from the book is a pure index update and the record stays
/// available for lookup by id and by trader.
#[derive(Debug)]
pub struct OrderBookStore {
    pool_address: String,
    base_token: TokenMetadata,
    quote_token: TokenMetadata,
    latest_price: String,

    /// Primary storage: order id -> Order
    orders: HashMap<String, Order>,

    /// Index: trader (lowercased) -> order ids, first-seen order
    trader_orders: HashMap<String, TraderOrders>,

    /// Index: price -> resting order ids in insertion order
    bids: BTreeMap<PriceKey, Vec<String>>,
    asks: BTreeMap<PriceKey, Vec<String>>,

    /// trader (lowercased) -> market order log
    market_orders: HashMap<String, Vec<MarketOrder>>,

    changes: BookChanges,
}

fn trader_key(trader: &str) -> String {
    trader.to_lowercase()
}

impl OrderBookStore {
    pub fn new(
        pool_address: impl Into<String>,
        base_token: TokenMetadata,
        quote_token: TokenMetadata,
        latest_price: impl Into<String>,
    ) -> Self {
        Self {
            pool_address: pool_address.into(),
            base_token,
            quote_token,
            latest_price: latest_price.into(),
            orders: HashMap::new(),
            trader_orders: HashMap::new(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            market_orders: HashMap::new(),
            changes: BookChanges::default(),
        }
    }

    /// Rebuild a book from persisted records.
    ///
    /// `bid_levels`/`ask_levels` carry the bucket contents in insertion order.
    pub fn restore(
        pool_address: impl Into<String>,
        base_token: TokenMetadata,
        quote_token: TokenMetadata,
        latest_price: impl Into<String>,
        orders: Vec<Order>,
        bid_levels: Vec<(String, Vec<String>)>,
        ask_levels: Vec<(String, Vec<String>)>,
        market_orders: HashMap<String, Vec<MarketOrder>>,
    ) -> Self {
        let mut store = Self::new(pool_address, base_token, quote_token, latest_price);

        let mut sorted = orders;
        sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        for order in sorted {
            store
                .trader_orders
                .entry(trader_key(&order.trader))
                .or_default()
                .insert(&order.id);
            store.orders.insert(order.id.clone(), order);
        }

        for (price, ids) in bid_levels {
            store.bids.insert(PriceKey::new(&price), ids);
        }
        for (price, ids) in ask_levels {
            store.asks.insert(PriceKey::new(&price), ids);
        }
        for (trader, log) in market_orders {
            store.market_orders.insert(trader_key(&trader), log);
        }

        store
    }

    fn side(&self, order_type: OrderType) -> &BTreeMap<PriceKey, Vec<String>> {
        match order_type {
            OrderType::Buy => &self.bids,
            OrderType::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, order_type: OrderType) -> &mut BTreeMap<PriceKey, Vec<String>> {
        match order_type {
            OrderType::Buy => &mut self.bids,
            OrderType::Sell => &mut self.asks,
        }
    }

    fn touch_bucket(&mut self, order_type: OrderType, price: &str) {
        self.changes.price_buckets.insert((order_type, price.to_string()));
        self.changes.sides.insert(order_type);
    }

    /// Insert a new order.
    ///
    /// Re-adding an existing id appends a second bucket entry; callers must not
    /// replay creation events.
    pub fn add_order(&mut self, order: Order) {
        let id = order.id.clone();
        let order_type = order.order_type;
        let price = order.price.clone();
        let trader = trader_key(&order.trader);

        self.trader_orders.entry(trader.clone()).or_default().insert(&id);

        self.side_mut(order_type)
            .entry(PriceKey::new(&price))
            .or_default()
            .push(id.clone());

        debug!(
            pool = %self.pool_address,
            order_id = %id,
            side = %order_type,
            price = %price,
            amount = %order.amount,
            "Order added"
        );

        self.orders.insert(id.clone(), order);
        self.changes.orders.insert(id);
        self.changes.traders.insert(trader);
        self.touch_bucket(order_type, &price);
    }

    /// Amend an order's size. Returns false for an unknown id.
    pub fn update_order(&mut self, id: &str, new_amount: &str, trader: &str) -> bool {
        let Some(order) = self.orders.get_mut(id) else {
            debug!(pool = %self.pool_address, order_id = %id, trader = %trader, "Update for unknown order");
            return false;
        };

        order.amount = new_amount.to_string();
        let remaining = (parse_amount(new_amount) - parse_amount(&order.filled)).max(0.0);
        order.remaining_amount = format_amount(remaining);

        self.changes.orders.insert(id.to_string());
        true
    }

    /// Record fill progress. An order that turns inactive leaves its price level.
    /// Returns false for an unknown id.
    pub fn update_order_filled(
        &mut self,
        id: &str,
        filled: &str,
        remaining: &str,
        trader: &str,
        is_active: bool,
    ) -> bool {
        let Some(order) = self.orders.get_mut(id) else {
            debug!(pool = %self.pool_address, order_id = %id, trader = %trader, "Fill for unknown order");
            return false;
        };

        order.filled = filled.to_string();
        order.remaining_amount = remaining.to_string();
        order.active = is_active;
        let order_type = order.order_type;
        let price = order.price.clone();

        self.changes.orders.insert(id.to_string());
        if !is_active {
            self.update_price_map(order_type, &price, id);
        }
        true
    }

    /// Mark an order inactive and evict it from its price level.
    /// The record stays retrievable by id. Returns false for an unknown id.
    pub fn remove_order(&mut self, id: &str) -> bool {
        let Some(order) = self.orders.get_mut(id) else {
            return false;
        };

        order.active = false;
        let order_type = order.order_type;
        let price = order.price.clone();

        self.changes.orders.insert(id.to_string());
        self.update_price_map(order_type, &price, id);
        true
    }

    /// Remove `id` from the bucket at `price`, dropping the bucket once empty.
    pub fn update_price_map(&mut self, order_type: OrderType, price: &str, id: &str) {
        let key = PriceKey::new(price);
        let side = self.side_mut(order_type);
        let Some(ids) = side.get_mut(&key) else {
            return;
        };

        ids.retain(|existing| existing != id);
        if ids.is_empty() {
            side.remove(&key);
        }
        self.touch_bucket(order_type, price);
    }

    /// Append to the trader's market order log
    pub fn add_market_order(&mut self, entry: MarketOrder, trader: &str) {
        let key = trader_key(trader);
        self.market_orders.entry(key.clone()).or_default().push(entry);
        self.changes.market_traders.insert(key);
    }

    pub fn set_latest_price(&mut self, price: impl Into<String>) {
        self.latest_price = price.into();
        self.changes.latest_price = true;
    }

    pub fn latest_price(&self) -> &str {
        &self.latest_price
    }

    pub fn pool_address(&self) -> &str {
        &self.pool_address
    }

    pub fn get_order(&self, id: &str) -> Option<Order> {
        self.orders.get(id).cloned()
    }

    /// All orders ever placed by a trader, active or not
    pub fn get_user_orders(&self, trader: &str) -> Vec<Order> {
        self.trader_orders
            .get(&trader_key(trader))
            .map(|index| {
                index
                    .ids
                    .iter()
                    .filter_map(|id| self.orders.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_market_orders(&self, trader: &str) -> Vec<MarketOrder> {
        self.market_orders
            .get(&trader_key(trader))
            .cloned()
            .unwrap_or_default()
    }

    fn build_level<'a>(&self, price: &PriceKey, ids: impl Iterator<Item = &'a String>) -> PriceLevel {
        // ids without a record are skipped
        let orders: Vec<Order> = ids.filter_map(|id| self.orders.get(id).cloned()).collect();
        let total_volume: f64 = orders
            .iter()
            .map(|o| parse_amount(&o.remaining_amount).max(0.0))
            .sum();

        PriceLevel {
            price: price.text.clone(),
            orders,
            total_volume: format_amount(total_volume),
        }
    }

    /// Bid levels, highest price first
    pub fn get_buy_levels(&self, limit: usize) -> Vec<PriceLevel> {
        self.bids
            .iter()
            .rev()
            .take(limit)
            .map(|(price, ids)| self.build_level(price, ids.iter()))
            .collect()
    }

    /// Ask levels, lowest price first
    pub fn get_sell_levels(&self, limit: usize) -> Vec<PriceLevel> {
        self.asks
            .iter()
            .take(limit)
            .map(|(price, ids)| self.build_level(price, ids.iter()))
            .collect()
    }

    /// Bucket contents of one side in ascending price order
    pub fn price_levels(&self, order_type: OrderType) -> Vec<(String, Vec<String>)> {
        self.side(order_type)
            .iter()
            .map(|(price, ids)| (price.text.clone(), ids.clone()))
            .collect()
    }

    /// Ids resting at one price
    pub fn orders_at_price(&self, order_type: OrderType, price: &str) -> Option<Vec<String>> {
        self.side(order_type).get(&PriceKey::new(price)).cloned()
    }

    pub fn get_order_book(&self, depth: usize) -> OrderBookSnapshot {
        OrderBookSnapshot {
            base_token: self.base_token.clone(),
            quote_token: self.quote_token.clone(),
            latest_price: self.latest_price.clone(),
            bids: self.get_buy_levels(depth),
            asks: self.get_sell_levels(depth),
        }
    }

    pub fn get_pool_info(&self) -> PoolInfo {
        PoolInfo {
            address: self.pool_address.clone(),
            base_token: self.base_token.clone(),
            quote_token: self.quote_token.clone(),
            latest_price: self.latest_price.clone(),
        }
    }

    /// Estimate the output of a market order by walking the opposite side best-first.
    ///
    /// A buy spends `amount` quote units against the asks and yields base; a sell
    /// spends `amount` base units against the bids and yields quote.
    pub fn get_amount_out(&self, order_type: OrderType, amount: &str) -> AmountOutResult {
        let requested = match amount.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => value,
            _ => return AmountOutResult::failed(INVALID_AMOUNT, "0".to_string(), Vec::new()),
        };

        let is_buy = order_type == OrderType::Buy;
        let levels = if is_buy {
            self.get_sell_levels(usize::MAX)
        } else {
            self.get_buy_levels(usize::MAX)
        };

        if levels.is_empty() {
            return AmountOutResult::failed(NO_LIQUIDITY, "0".to_string(), Vec::new());
        }

        let mut remaining = requested;
        let mut total_output = 0.0f64;
        let mut prices = Vec::new();

        for level in &levels {
            if remaining <= 0.0 {
                break;
            }

            let level_price = parse_amount(&level.price);
            if level_price <= 0.0 {
                continue;
            }
            let level_volume = parse_amount(&level.total_volume).max(0.0);

            if is_buy {
                let quote_spend = remaining.min(level_volume * level_price);
                total_output += quote_spend / level_price;
                remaining -= quote_spend;
            } else {
                let base_sell = remaining.min(level_volume);
                total_output += base_sell * level_price;
                remaining -= base_sell;
            }

            prices.push(level.price.clone());
        }

        if remaining > 0.0 {
            return AmountOutResult::failed(INSUFFICIENT_LIQUIDITY, format_amount(total_output), prices);
        }

        AmountOutResult::filled(format_amount(total_output), prices)
    }

    /// Drain the record of keys touched since the last call
    pub fn take_changes(&mut self) -> BookChanges {
        std::mem::take(&mut self.changes)
    }

    /// Put back changes that could not be persisted so the next flush
    /// rewrites their keys from the current state
    pub fn requeue_changes(&mut self, changes: BookChanges) {
        self.changes.merge(changes);
    }

    /// Total number of orders ever seen
    pub fn count(&self) -> usize {
        self.orders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(symbol: &str, decimals: u8) -> TokenMetadata {
        TokenMetadata {
            address: format!("0x{}", symbol.to_lowercase()),
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            decimals,
        }
    }

    fn store() -> OrderBookStore {
        OrderBookStore::new("0xpool", token("BASE", 18), token("QUOTE", 6), "0")
    }

    fn order(id: &str, trader: &str, side: OrderType, price: &str, amount: &str) -> Order {
        Order {
            id: id.to_string(),
            trader: trader.to_string(),
            price: price.to_string(),
            amount: amount.to_string(),
            filled: "0".to_string(),
            remaining_amount: amount.to_string(),
            order_type: side,
            active: true,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_inactive_fill_leaves_levels_but_keeps_record() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Buy, "10", "5"));
        book.add_order(order("2", "0xB", OrderType::Sell, "12", "3"));

        assert!(book.update_order_filled("1", "5", "0", "0xA", false));
        assert!(book.update_order_filled("2", "3", "0", "0xB", false));

        assert!(book.get_buy_levels(10).is_empty());
        assert!(book.get_sell_levels(10).is_empty());

        let filled = book.get_order("1").unwrap();
        assert!(!filled.active);
        assert_eq!(filled.filled, "5");
        assert_eq!(filled.remaining_amount, "0");
    }

    #[test]
    fn test_levels_sorted_and_truncated() {
        let mut book = store();
        for (i, price) in ["10", "12", "9.5", "11"].iter().enumerate() {
            book.add_order(order(&format!("b{}", i), "0xA", OrderType::Buy, price, "1"));
            book.add_order(order(&format!("s{}", i), "0xA", OrderType::Sell, price, "1"));
        }

        let bids: Vec<String> = book.get_buy_levels(3).into_iter().map(|l| l.price).collect();
        assert_eq!(bids, vec!["12", "11", "10"]);

        let asks: Vec<String> = book.get_sell_levels(3).into_iter().map(|l| l.price).collect();
        assert_eq!(asks, vec!["9.5", "10", "11"]);

        assert_eq!(book.get_buy_levels(0).len(), 0);
        assert_eq!(book.get_sell_levels(100).len(), 4);
    }

    #[test]
    fn test_best_bid_volume_sums_unfilled() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Buy, "10", "5"));
        book.add_order(order("2", "0xB", OrderType::Buy, "10", "2.5"));
        book.add_order(order("3", "0xB", OrderType::Buy, "9", "100"));
        book.update_order_filled("1", "1", "4", "0xA", true);

        let snapshot = book.get_order_book(5);
        assert_eq!(snapshot.bids[0].price, "10");
        assert_eq!(snapshot.bids[0].total_volume, "6.5");
        let ids: Vec<&str> = snapshot.bids[0].orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_amount_out_buy_walks_asks() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Sell, "10", "5"));
        book.add_order(order("2", "0xA", OrderType::Sell, "11", "5"));

        let result = book.get_amount_out(OrderType::Buy, "60");
        assert!(!result.is_error);
        assert_eq!(result.prices, vec!["10", "11"]);
        let output: f64 = result.output_amount.parse().unwrap();
        assert!((output - (5.0 + 10.0 / 11.0)).abs() < 1e-12);
    }

    #[test]
    fn test_amount_out_sell_walks_bids_and_stops_early() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Buy, "10", "5"));
        book.add_order(order("2", "0xA", OrderType::Buy, "9", "5"));
        book.add_order(order("3", "0xA", OrderType::Buy, "8", "5"));

        let result = book.get_amount_out(OrderType::Sell, "7");
        assert!(!result.is_error);
        assert_eq!(result.output_amount, "68");
        assert_eq!(result.prices, vec!["10", "9"]);
    }

    #[test]
    fn test_amount_out_no_liquidity() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Buy, "10", "5"));

        let result = book.get_amount_out(OrderType::Buy, "10");
        assert!(result.is_error);
        assert_eq!(result.error_message.as_deref(), Some(NO_LIQUIDITY));
        assert_eq!(result.output_amount, "0");
        assert!(result.prices.is_empty());
    }

    #[test]
    fn test_amount_out_insufficient_liquidity_returns_partial() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Sell, "10", "1"));
        book.add_order(order("2", "0xA", OrderType::Sell, "20", "1"));

        let result = book.get_amount_out(OrderType::Buy, "100");
        assert!(result.is_error);
        assert_eq!(result.error_message.as_deref(), Some(INSUFFICIENT_LIQUIDITY));
        assert_eq!(result.output_amount, "2");
        assert_eq!(result.prices, vec!["10", "20"]);
    }

    #[test]
    fn test_amount_out_rejects_bad_amount() {
        let book = store();
        let result = book.get_amount_out(OrderType::Sell, "-3");
        assert!(result.is_error);
        assert_eq!(result.error_message.as_deref(), Some(INVALID_AMOUNT));
    }

    #[test]
    fn test_replayed_fill_is_idempotent() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Sell, "10", "5"));
        book.add_order(order("2", "0xA", OrderType::Sell, "10", "5"));

        book.update_order_filled("1", "5", "0", "0xA", false);
        let once_order = book.get_order("1");
        let once_levels = book.get_sell_levels(10);

        book.update_order_filled("1", "5", "0", "0xA", false);
        assert_eq!(book.get_order("1"), once_order);
        assert_eq!(book.get_sell_levels(10), once_levels);
        assert_eq!(book.orders_at_price(OrderType::Sell, "10"), Some(vec!["2".to_string()]));
    }

    #[test]
    fn test_remove_order_drops_empty_bucket() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Buy, "10", "5"));

        assert!(book.remove_order("1"));
        assert!(book.orders_at_price(OrderType::Buy, "10").is_none());
        assert!(!book.get_order("1").unwrap().active);
        assert!(!book.remove_order("missing"));
    }

    #[test]
    fn test_update_order_unknown_and_known() {
        let mut book = store();
        assert!(!book.update_order("9", "3", "0xA"));

        book.add_order(order("1", "0xA", OrderType::Buy, "10", "5"));
        book.update_order_filled("1", "2", "3", "0xA", true);
        assert!(book.update_order("1", "8", "0xA"));

        let updated = book.get_order("1").unwrap();
        assert_eq!(updated.amount, "8");
        assert_eq!(updated.filled, "2");
        assert_eq!(updated.remaining_amount, "6");
        assert!(updated.active);
        assert_eq!(book.get_buy_levels(1)[0].total_volume, "6");
    }

    #[test]
    fn test_duplicate_add_creates_duplicate_bucket_entry() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Buy, "10", "5"));
        book.add_order(order("1", "0xA", OrderType::Buy, "10", "5"));

        assert_eq!(
            book.orders_at_price(OrderType::Buy, "10"),
            Some(vec!["1".to_string(), "1".to_string()])
        );
        assert_eq!(book.get_user_orders("0xa").len(), 1);
    }

    #[test]
    fn test_user_orders_and_market_orders() {
        let mut book = store();
        book.add_order(order("1", "0xAbC", OrderType::Buy, "10", "5"));
        book.add_order(order("2", "0xAbC", OrderType::Sell, "11", "5"));
        book.remove_order("2");

        let orders = book.get_user_orders("0xabc");
        assert_eq!(orders.len(), 2);
        assert!(book.get_user_orders("0xdef").is_empty());

        let entry = MarketOrder {
            timestamp: 1,
            amount: "3".to_string(),
            order_type: OrderType::Buy,
        };
        book.add_market_order(entry.clone(), "0xABC");
        book.add_market_order(entry.clone(), "0xabc");
        assert_eq!(book.get_market_orders("0xAbC"), vec![entry.clone(), entry]);
        assert!(book.get_market_orders("0xdef").is_empty());
    }

    #[test]
    fn test_dangling_ids_are_skipped() {
        let mut book = OrderBookStore::restore(
            "0xpool",
            token("BASE", 18),
            token("QUOTE", 6),
            "10",
            vec![order("1", "0xA", OrderType::Sell, "10", "2")],
            Vec::new(),
            vec![("10".to_string(), vec!["1".to_string(), "ghost".to_string()])],
            HashMap::new(),
        );

        let asks = book.get_sell_levels(10);
        assert_eq!(asks[0].orders.len(), 1);
        assert_eq!(asks[0].total_volume, "2");

        book.set_latest_price("10.5");
        assert_eq!(book.get_pool_info().latest_price, "10.5");
    }

    #[test]
    fn test_take_changes_tracks_touched_keys() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Buy, "10", "5"));
        book.set_latest_price("10");

        let changes = book.take_changes();
        assert!(changes.orders.contains("1"));
        assert!(changes.traders.contains("0xa"));
        assert!(changes.price_buckets.contains(&(OrderType::Buy, "10".to_string())));
        assert!(changes.latest_price);
        assert!(book.take_changes().is_empty());
    }

    #[test]
    fn test_requeued_changes_merge_with_new_ones() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Buy, "10", "5"));
        let failed = book.take_changes();

        book.set_latest_price("11");
        book.requeue_changes(failed);

        let changes = book.take_changes();
        assert!(changes.orders.contains("1"));
        assert!(changes.sides.contains(&OrderType::Buy));
        assert!(changes.latest_price);
        assert!(book.take_changes().is_empty());
    }

    #[test]
    fn test_shrinking_below_filled_never_goes_negative() {
        let mut book = store();
        book.add_order(order("1", "0xA", OrderType::Sell, "10", "5"));
        book.add_order(order("2", "0xA", OrderType::Sell, "10", "1"));
        book.update_order_filled("1", "4", "1", "0xA", true);
        assert!(book.update_order("1", "3", "0xA"));

        let updated = book.get_order("1").unwrap();
        assert_eq!(updated.remaining_amount, "0");
        let level = &book.get_sell_levels(1)[0];
        assert_eq!(level.total_volume, "1");

        let result = book.get_amount_out(OrderType::Buy, "10");
        assert!(!result.is_error);
        assert_eq!(result.output_amount, "1");
    }

    #[test]
    fn test_trader_index_dedups_and_keeps_first_seen_order() {
        let mut book = store();
        for i in (0..500).rev() {
            book.add_order(order(&i.to_string(), "0xA", OrderType::Buy, "10", "1"));
        }
        book.add_order(order("250", "0xA", OrderType::Buy, "10", "1"));

        let ids: Vec<String> = book.get_user_orders("0xa").into_iter().map(|o| o.id).collect();
        assert_eq!(ids.len(), 500);
        assert_eq!(ids[0], "499");
        assert_eq!(ids[499], "0");
    }
}
