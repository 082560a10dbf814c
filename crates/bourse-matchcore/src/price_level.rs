//! A single price level in the order book.
//!
//! Entries at the same price are kept in FIFO order (time priority)
//! using a [`VecDeque`]. Admission sequences are monotonic per
//! instrument, so insertion order equals `created_at` order.

use std::collections::VecDeque;

use bourse_types::{AccountId, Order, OrderId, OrderSide};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// The resting part of an order, as the book sees it.
///
/// The full [`Order`] record lives in the store; the book only keeps
/// what price-time priority and settlement need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookEntry {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub side: OrderSide,
    pub price: Decimal,
    pub remaining: u64,
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
}

impl BookEntry {
    /// Book entry for a live LIMIT order. MARKET orders never rest, so
    /// they yield `None`, as do orders with nothing left.
    #[must_use]
    pub fn from_order(order: &Order) -> Option<Self> {
        let price = order.limit_price?;
        if order.is_market() || order.status().is_terminal() || order.remaining_quantity() == 0 {
            return None;
        }
        Some(Self {
            order_id: order.id,
            account_id: order.account_id,
            side: order.side,
            price,
            remaining: order.remaining_quantity(),
            sequence: order.sequence,
            created_at: order.created_at,
        })
    }
}

/// All entries resting at one price.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: Decimal,
    /// Front = oldest = filled first.
    pub entries: VecDeque<BookEntry>,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            entries: VecDeque::new(),
        }
    }

    /// Add an entry at the back (lowest time priority).
    pub fn push_back(&mut self, entry: BookEntry) {
        self.entries.push_back(entry);
    }

    #[must_use]
    pub fn front(&self) -> Option<&BookEntry> {
        self.entries.front()
    }

    pub fn get_mut(&mut self, order_id: &OrderId) -> Option<&mut BookEntry> {
        self.entries.iter_mut().find(|e| e.order_id == *order_id)
    }

    /// Total remaining shares across all entries at this level.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.entries.iter().map(|e| e.remaining).sum()
    }

    pub fn remove_entry(&mut self, order_id: &OrderId) -> Option<BookEntry> {
        let pos = self.entries.iter().position(|e| e.order_id == *order_id)?;
        self.entries.remove(pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BookEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use bourse_types::*;

    use super::*;

    fn entry(qty: u64, seq: u64) -> BookEntry {
        let mut order = Order::dummy_limit(OrderSide::Sell, Decimal::new(200, 2), qty);
        order.sequence = seq;
        BookEntry::from_order(&order).unwrap()
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut level = PriceLevel::new(Decimal::new(200, 2));
        let first = entry(5, 1);
        let first_id = first.order_id;
        level.push_back(first);
        level.push_back(entry(3, 2));
        assert_eq!(level.front().unwrap().order_id, first_id);
        assert_eq!(level.len(), 2);
        assert_eq!(level.total_quantity(), 8);
    }

    #[test]
    fn remove_by_id() {
        let mut level = PriceLevel::new(Decimal::new(200, 2));
        let a = entry(1, 1);
        let b = entry(1, 2);
        let b_id = b.order_id;
        level.push_back(a);
        level.push_back(b);
        assert_eq!(level.remove_entry(&b_id).unwrap().order_id, b_id);
        assert!(level.remove_entry(&OrderId::new()).is_none());
        assert_eq!(level.len(), 1);
    }

    #[test]
    fn market_orders_never_rest() {
        let request = OrderRequest::market(InstrumentId::new(), OrderSide::Buy, 10);
        let order = Order::new(AccountId::new(), &request, 0, Utc::now()).unwrap();
        assert!(BookEntry::from_order(&order).is_none());
    }

    #[test]
    fn cancelled_orders_never_rest() {
        let mut order = Order::dummy_limit(OrderSide::Buy, Decimal::ONE, 4);
        order.cancel(Utc::now()).unwrap();
        assert!(BookEntry::from_order(&order).is_none());
    }

    #[test]
    fn empty_level() {
        let level = PriceLevel::new(Decimal::ONE);
        assert!(level.is_empty());
        assert_eq!(level.total_quantity(), 0);
        assert!(level.front().is_none());
    }
}
