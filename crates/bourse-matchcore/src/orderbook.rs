//! The order book for a single instrument.
//!
//! Uses `BTreeMap` for price-level ordering:
//! - **Bids** (buys): `BTreeMap<Reverse<Decimal>, PriceLevel>` -- highest price first
//! - **Asks** (sells): `BTreeMap<Decimal, PriceLevel>` -- lowest price first
//!
//! An auxiliary `HashMap<OrderId, (Side, Price)>` locates an entry's level
//! for cancellation and fills without scanning.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use bourse_types::{BourseError, InstrumentId, Order, OrderId, OrderSide, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::price_level::{BookEntry, PriceLevel};

/// Resting LIMIT orders of one instrument.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub instrument_id: InstrumentId,
    bids: BTreeMap<Reverse<Decimal>, PriceLevel>,
    asks: BTreeMap<Decimal, PriceLevel>,
    index: HashMap<OrderId, (OrderSide, Decimal)>,
}

/// One aggregated level of a depth snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub price: Decimal,
    pub quantity: u64,
    pub order_count: usize,
}

/// Read-only view of the book for the query surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub instrument_id: InstrumentId,
    /// Best (highest) first.
    pub bids: Vec<LevelSummary>,
    /// Best (lowest) first.
    pub asks: Vec<LevelSummary>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub last_trade_price: Option<Decimal>,
}

impl OrderBook {
    #[must_use]
    pub fn new(instrument_id: InstrumentId) -> Self {
        Self {
            instrument_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    // =================================================================
    // Insertion / removal
    // =================================================================

    /// Rest an entry at the back of its price level.
    pub fn insert(&mut self, entry: BookEntry) -> Result<()> {
        if self.index.contains_key(&entry.order_id) {
            return Err(BourseError::InvariantViolation {
                reason: format!("order {} is already resting", entry.order_id),
            });
        }
        if entry.remaining == 0 {
            return Err(BourseError::InvariantViolation {
                reason: format!("order {} has nothing left to rest", entry.order_id),
            });
        }

        let price = entry.price;
        self.index.insert(entry.order_id, (entry.side, price));
        match entry.side {
            OrderSide::Buy => self
                .bids
                .entry(Reverse(price))
                .or_insert_with(|| PriceLevel::new(price))
                .push_back(entry),
            OrderSide::Sell => self
                .asks
                .entry(price)
                .or_insert_with(|| PriceLevel::new(price))
                .push_back(entry),
        }
        Ok(())
    }

    /// Rest a live LIMIT order. MARKET and terminal orders are refused.
    pub fn rest(&mut self, order: &Order) -> Result<()> {
        let entry = BookEntry::from_order(order).ok_or_else(|| BourseError::InvariantViolation {
            reason: format!("order {} cannot rest on the book", order.id),
        })?;
        self.insert(entry)
    }

    /// Remove an entry entirely (cancellation).
    pub fn remove(&mut self, order_id: &OrderId) -> Result<BookEntry> {
        let (side, price) = self
            .index
            .remove(order_id)
            .ok_or(BourseError::OrderNotFound(*order_id))?;

        let entry = match side {
            OrderSide::Buy => {
                let level = self
                    .bids
                    .get_mut(&Reverse(price))
                    .ok_or(BourseError::OrderNotFound(*order_id))?;
                let entry = level
                    .remove_entry(order_id)
                    .ok_or(BourseError::OrderNotFound(*order_id))?;
                if level.is_empty() {
                    self.bids.remove(&Reverse(price));
                }
                entry
            }
            OrderSide::Sell => {
                let level = self
                    .asks
                    .get_mut(&price)
                    .ok_or(BourseError::OrderNotFound(*order_id))?;
                let entry = level
                    .remove_entry(order_id)
                    .ok_or(BourseError::OrderNotFound(*order_id))?;
                if level.is_empty() {
                    self.asks.remove(&price);
                }
                entry
            }
        };
        Ok(entry)
    }

    /// Take `quantity` off a resting entry, removing it once exhausted.
    ///
    /// Returns the quantity still resting.
    pub fn reduce(&mut self, order_id: &OrderId, quantity: u64) -> Result<u64> {
        let (side, price) = *self
            .index
            .get(order_id)
            .ok_or(BourseError::OrderNotFound(*order_id))?;
        let level = match side {
            OrderSide::Buy => self.bids.get_mut(&Reverse(price)),
            OrderSide::Sell => self.asks.get_mut(&price),
        }
        .ok_or(BourseError::OrderNotFound(*order_id))?;
        let entry = level
            .get_mut(order_id)
            .ok_or(BourseError::OrderNotFound(*order_id))?;
        if quantity > entry.remaining {
            return Err(BourseError::InvariantViolation {
                reason: format!(
                    "fill of {quantity} exceeds resting {} on {order_id}",
                    entry.remaining
                ),
            });
        }
        entry.remaining -= quantity;
        let left = entry.remaining;
        if left == 0 {
            self.remove(order_id)?;
        }
        Ok(left)
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn get(&self, order_id: &OrderId) -> Option<&BookEntry> {
        let (side, price) = self.index.get(order_id)?;
        let level = match side {
            OrderSide::Buy => self.bids.get(&Reverse(*price)),
            OrderSide::Sell => self.asks.get(price),
        }?;
        level.iter().find(|e| e.order_id == *order_id)
    }

    /// Best (highest) bid price, or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next().map(|r| r.0)
    }

    /// Best (lowest) ask price, or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Spread = best_ask - best_bid. `None` if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    #[must_use]
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    /// Iterate bid levels from best (highest) to worst.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values()
    }

    /// Iterate ask levels from best (lowest) to worst.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }

    /// Entries on `side` in price-time priority.
    pub fn entries(&self, side: OrderSide) -> Box<dyn Iterator<Item = &BookEntry> + '_> {
        match side {
            OrderSide::Buy => Box::new(self.bids.values().flat_map(|level| level.iter())),
            OrderSide::Sell => Box::new(self.asks.values().flat_map(|level| level.iter())),
        }
    }

    /// Resting entries an incoming order would cross, best first.
    ///
    /// Stops at the first price the incoming order refuses; every level
    /// behind it is worse.
    #[must_use]
    pub fn crossing_entries(&self, incoming: &Order) -> Vec<BookEntry> {
        self.entries(incoming.side.opposite())
            .take_while(|e| incoming.accepts_price(e.price))
            .cloned()
            .collect()
    }

    /// Aggregated depth, at most `depth` levels per side.
    #[must_use]
    pub fn snapshot(&self, depth: usize, last_trade_price: Option<Decimal>) -> BookSnapshot {
        let summarize = |level: &PriceLevel| LevelSummary {
            price: level.price,
            quantity: level.total_quantity(),
            order_count: level.len(),
        };
        BookSnapshot {
            instrument_id: self.instrument_id,
            bids: self.bid_levels().take(depth).map(summarize).collect(),
            asks: self.ask_levels().take(depth).map(summarize).collect(),
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            spread: self.spread(),
            last_trade_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use bourse_types::*;
    use rust_decimal::Decimal;

    use super::*;

    fn rest(book: &mut OrderBook, side: OrderSide, price: Decimal, qty: u64, seq: u64) -> OrderId {
        let mut order = Order::dummy_limit(side, price, qty);
        order.sequence = seq;
        let id = order.id;
        book.rest(&order).unwrap();
        id
    }

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 2)
    }

    #[test]
    fn best_bid_ask_and_spread() {
        let mut book = OrderBook::new(InstrumentId::new());
        rest(&mut book, OrderSide::Buy, d(100), 1, 1);
        rest(&mut book, OrderSide::Buy, d(99), 1, 2);
        rest(&mut book, OrderSide::Sell, d(101), 1, 3);
        rest(&mut book, OrderSide::Sell, d(102), 1, 4);

        assert_eq!(book.best_bid(), Some(d(100)));
        assert_eq!(book.best_ask(), Some(d(101)));
        assert_eq!(book.spread(), Some(d(1)));
        assert_eq!(book.order_count(), 4);
        assert_eq!((book.bid_depth(), book.ask_depth()), (2, 2));
    }

    #[test]
    fn remove_drops_empty_level() {
        let mut book = OrderBook::new(InstrumentId::new());
        let id = rest(&mut book, OrderSide::Sell, d(200), 20, 1);
        assert_eq!(book.ask_depth(), 1);
        let entry = book.remove(&id).unwrap();
        assert_eq!(entry.remaining, 20);
        assert!(book.is_empty());
        assert_eq!(book.ask_depth(), 0);
    }

    #[test]
    fn remove_unknown_order() {
        let mut book = OrderBook::new(InstrumentId::new());
        assert!(matches!(
            book.remove(&OrderId::new()),
            Err(BourseError::OrderNotFound(_))
        ));
    }

    #[test]
    fn duplicate_rest_rejected() {
        let mut book = OrderBook::new(InstrumentId::new());
        let order = Order::dummy_limit(OrderSide::Buy, d(100), 1);
        book.rest(&order).unwrap();
        assert!(book.rest(&order).is_err());
    }

    #[test]
    fn reduce_partially_then_fully() {
        let mut book = OrderBook::new(InstrumentId::new());
        let id = rest(&mut book, OrderSide::Sell, d(200), 5, 1);
        assert_eq!(book.reduce(&id, 2).unwrap(), 3);
        assert_eq!(book.get(&id).unwrap().remaining, 3);
        assert!(book.reduce(&id, 4).is_err());
        assert_eq!(book.reduce(&id, 3).unwrap(), 0);
        assert!(!book.contains(&id));
        assert_eq!(book.ask_depth(), 0);
    }

    #[test]
    fn bid_levels_iterate_highest_first() {
        let mut book = OrderBook::new(InstrumentId::new());
        rest(&mut book, OrderSide::Buy, d(90), 1, 1);
        rest(&mut book, OrderSide::Buy, d(100), 1, 2);
        rest(&mut book, OrderSide::Buy, d(95), 1, 3);
        let prices: Vec<Decimal> = book.bid_levels().map(|l| l.price).collect();
        assert_eq!(prices, vec![d(100), d(95), d(90)]);
    }

    #[test]
    fn crossing_entries_respect_limit_and_time() {
        let mut book = OrderBook::new(InstrumentId::new());
        let a = rest(&mut book, OrderSide::Sell, d(210), 5, 1);
        let b = rest(&mut book, OrderSide::Sell, d(200), 5, 2);
        let c = rest(&mut book, OrderSide::Sell, d(200), 5, 3);
        rest(&mut book, OrderSide::Sell, d(260), 5, 4);

        let buy = Order::dummy_limit(OrderSide::Buy, d(250), 30);
        let ids: Vec<OrderId> = book.crossing_entries(&buy).iter().map(|e| e.order_id).collect();
        assert_eq!(ids, vec![b, c, a]);

        let request = OrderRequest::market(InstrumentId::new(), OrderSide::Buy, 1);
        let market = Order::new(AccountId::new(), &request, 0, chrono::Utc::now()).unwrap();
        assert_eq!(book.crossing_entries(&market).len(), 4);
    }

    #[test]
    fn snapshot_aggregates_levels() {
        let mut book = OrderBook::new(InstrumentId::new());
        rest(&mut book, OrderSide::Sell, d(200), 5, 1);
        rest(&mut book, OrderSide::Sell, d(200), 7, 2);
        rest(&mut book, OrderSide::Sell, d(300), 1, 3);
        rest(&mut book, OrderSide::Buy, d(150), 4, 4);

        let snap = book.snapshot(1, Some(d(180)));
        assert_eq!(snap.asks.len(), 1);
        assert_eq!(
            snap.asks[0],
            LevelSummary {
                price: d(200),
                quantity: 12,
                order_count: 2
            }
        );
        assert_eq!(snap.bids[0].quantity, 4);
        assert_eq!(snap.spread, Some(d(50)));
        assert_eq!(snap.last_trade_price, Some(d(180)));
    }

    #[test]
    fn empty_book() {
        let book = OrderBook::new(InstrumentId::new());
        assert!(book.is_empty());
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.spread(), None);
    }
}
