//! Continuous price-time matcher.
//!
//! An incoming order sweeps the opposite side of the book in priority
//! order. Each eligible pair executes at the **resting** order's price
//! for `min(remaining(incoming), remaining(resting))` shares.
//!
//! The matcher itself never touches balances. Every candidate fill is
//! handed to a settle callback, which applies the money and share
//! movements in the caller's transaction and decides whether the fill
//! happened:
//!
//! ```text
//! settle(resting, quantity, price) -> Filled | Skip | Err
//! ```
//!
//! `Skip` leaves the resting entry untouched and moves on (e.g. a
//! resting buyer who can no longer pay). An `Err` aborts the sweep; the
//! caller discards its transaction.
//!
//! ## Self-Trade Prevention
//!
//! With prevention on, resting entries owned by the incoming order's
//! account are passed over. The incoming order continues with the next
//! entry in priority order.

use std::collections::HashSet;

use bourse_types::{AccountId, Order, OrderId, Result};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::{OrderBook, price_level::BookEntry};

/// Result of settling one candidate fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Filled,
    Skip,
}

/// One executed pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    /// The resting entry as it was before this fill.
    pub resting: BookEntry,
    pub quantity: u64,
    /// Maker price.
    pub price: Decimal,
}

/// Everything one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub fills: Vec<Fill>,
    /// Resting orders passed over (self-trade or settle `Skip`).
    pub skipped: Vec<OrderId>,
    /// Quantity of the incoming order left after the sweep.
    pub remaining: u64,
}

impl MatchReport {
    #[must_use]
    pub fn filled_quantity(&self) -> u64 {
        self.fills.iter().map(|f| f.quantity).sum()
    }
}

/// Sweep `incoming` across the book until it is filled or nothing
/// eligible is left.
///
/// The book is reduced for every `Filled` outcome. `incoming` itself is
/// not modified; the caller applies fills to its own order record.
pub fn match_incoming<F>(
    book: &mut OrderBook,
    incoming: &Order,
    self_trade_prevention: bool,
    mut settle: F,
) -> Result<MatchReport>
where
    F: FnMut(&BookEntry, u64, Decimal) -> Result<FillOutcome>,
{
    let mut report = MatchReport {
        remaining: incoming.remaining_quantity(),
        ..MatchReport::default()
    };

    for resting in book.crossing_entries(incoming) {
        if report.remaining == 0 {
            break;
        }
        if self_trade_prevention && resting.account_id == incoming.account_id {
            warn!(
                incoming = %incoming.id,
                resting = %resting.order_id,
                account = %incoming.account_id,
                "self-trade prevented, skipping resting order"
            );
            report.skipped.push(resting.order_id);
            continue;
        }

        let quantity = report.remaining.min(resting.remaining);
        let price = resting.price;
        match settle(&resting, quantity, price)? {
            FillOutcome::Filled => {
                book.reduce(&resting.order_id, quantity)?;
                report.remaining -= quantity;
                debug!(
                    incoming = %incoming.id,
                    resting = %resting.order_id,
                    quantity,
                    %price,
                    "fill"
                );
                report.fills.push(Fill {
                    resting,
                    quantity,
                    price,
                });
            }
            FillOutcome::Skip => report.skipped.push(resting.order_id),
        }
    }

    Ok(report)
}

/// The best resting entry `incoming` may trade with, ignoring `exclude`
/// and (with prevention on) the incoming account's own orders.
///
/// Used when each fill runs in its own transaction.
#[must_use]
pub fn best_counterparty(
    book: &OrderBook,
    incoming: &Order,
    self_trade_prevention: bool,
    exclude: &HashSet<OrderId>,
) -> Option<BookEntry> {
    book.entries(incoming.side.opposite())
        .take_while(|e| incoming.accepts_price(e.price))
        .find(|e| {
            !exclude.contains(&e.order_id)
                && !(self_trade_prevention && e.account_id == incoming.account_id)
        })
        .cloned()
}

/// Accounts owning resting entries `incoming` could trade with.
///
/// Sorted and deduplicated so the caller can lock them in global order
/// before sweeping.
#[must_use]
pub fn crossing_accounts(book: &OrderBook, incoming: &Order) -> Vec<AccountId> {
    let mut accounts: Vec<AccountId> = book
        .crossing_entries(incoming)
        .into_iter()
        .map(|e| e.account_id)
        .collect();
    accounts.sort();
    accounts.dedup();
    accounts
}

#[cfg(test)]
mod tests {
    use bourse_types::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 2)
    }

    fn rest(book: &mut OrderBook, account: AccountId, side: OrderSide, price: Decimal, qty: u64) -> OrderId {
        let order = Order::dummy_limit_for(account, side, price, qty);
        let id = order.id;
        book.rest(&order).unwrap();
        id
    }

    fn market(account: AccountId, side: OrderSide, qty: u64) -> Order {
        let request = OrderRequest::market(InstrumentId::new(), side, qty);
        Order::new(account, &request, 0, Utc::now()).unwrap()
    }

    fn always_fill(_: &BookEntry, _: u64, _: Decimal) -> Result<FillOutcome> {
        Ok(FillOutcome::Filled)
    }

    #[test]
    fn executes_at_maker_price() {
        let mut book = OrderBook::new(InstrumentId::new());
        let sell = rest(&mut book, AccountId::new(), OrderSide::Sell, d(200), 5);
        let buy = Order::dummy_limit(OrderSide::Buy, d(250), 5);

        let report = match_incoming(&mut book, &buy, true, always_fill).unwrap();
        assert_eq!(report.fills.len(), 1);
        assert_eq!(report.fills[0].price, d(200));
        assert_eq!(report.fills[0].quantity, 5);
        assert_eq!(report.fills[0].resting.order_id, sell);
        assert_eq!(report.remaining, 0);
        assert!(book.is_empty());
    }

    #[test]
    fn no_cross_no_fill() {
        let mut book = OrderBook::new(InstrumentId::new());
        rest(&mut book, AccountId::new(), OrderSide::Sell, d(300), 5);
        let buy = Order::dummy_limit(OrderSide::Buy, d(250), 5);
        let report = match_incoming(&mut book, &buy, true, always_fill).unwrap();
        assert!(report.fills.is_empty());
        assert_eq!(report.remaining, 5);
        assert_eq!(book.order_count(), 1);
    }

    #[test]
    fn market_order_sweeps_levels_and_reports_remainder() {
        let mut book = OrderBook::new(InstrumentId::new());
        rest(&mut book, AccountId::new(), OrderSide::Sell, d(200), 10);
        rest(&mut book, AccountId::new(), OrderSide::Sell, d(210), 20);
        let buy = market(AccountId::new(), OrderSide::Buy, 100);

        let report = match_incoming(&mut book, &buy, true, always_fill).unwrap();
        assert_eq!(report.filled_quantity(), 30);
        assert_eq!(report.remaining, 70);
        let prices: Vec<Decimal> = report.fills.iter().map(|f| f.price).collect();
        assert_eq!(prices, vec![d(200), d(210)]);
    }

    #[test]
    fn partial_fill_leaves_resting_remainder() {
        let mut book = OrderBook::new(InstrumentId::new());
        let sell = rest(&mut book, AccountId::new(), OrderSide::Sell, d(200), 8);
        let buy = Order::dummy_limit(OrderSide::Buy, d(200), 3);
        let report = match_incoming(&mut book, &buy, true, always_fill).unwrap();
        assert_eq!(report.filled_quantity(), 3);
        assert_eq!(book.get(&sell).unwrap().remaining, 5);
    }

    #[test]
    fn time_priority_within_level() {
        let mut book = OrderBook::new(InstrumentId::new());
        let first = rest(&mut book, AccountId::new(), OrderSide::Buy, d(150), 2);
        let second = rest(&mut book, AccountId::new(), OrderSide::Buy, d(150), 2);
        let sell = Order::dummy_limit(OrderSide::Sell, d(100), 3);

        let report = match_incoming(&mut book, &sell, true, always_fill).unwrap();
        assert_eq!(report.fills[0].resting.order_id, first);
        assert_eq!(report.fills[1].resting.order_id, second);
        assert_eq!(report.fills[1].quantity, 1);
        assert_eq!(report.fills[0].price, d(150));
    }

    #[test]
    fn self_trade_is_skipped_and_matching_continues() {
        let me = AccountId::new();
        let mut book = OrderBook::new(InstrumentId::new());
        let own = rest(&mut book, me, OrderSide::Sell, d(100), 1);
        let other = rest(&mut book, AccountId::new(), OrderSide::Sell, d(100), 1);
        let buy = Order::dummy_limit_for(me, OrderSide::Buy, d(100), 1);

        let report = match_incoming(&mut book, &buy, true, always_fill).unwrap();
        assert_eq!(report.skipped, vec![own]);
        assert_eq!(report.fills[0].resting.order_id, other);
        assert!(book.contains(&own));
    }

    #[test]
    fn self_trade_allowed_when_prevention_off() {
        let me = AccountId::new();
        let mut book = OrderBook::new(InstrumentId::new());
        rest(&mut book, me, OrderSide::Sell, d(100), 1);
        let buy = Order::dummy_limit_for(me, OrderSide::Buy, d(100), 1);
        let report = match_incoming(&mut book, &buy, false, always_fill).unwrap();
        assert_eq!(report.fills.len(), 1);
    }

    #[test]
    fn settle_skip_leaves_entry_resting() {
        let mut book = OrderBook::new(InstrumentId::new());
        let broke = rest(&mut book, AccountId::new(), OrderSide::Buy, d(200), 5);
        let good = rest(&mut book, AccountId::new(), OrderSide::Buy, d(190), 5);
        let sell = Order::dummy_limit(OrderSide::Sell, d(100), 5);

        let report = match_incoming(&mut book, &sell, true, |entry, _, _| {
            Ok(if entry.order_id == broke {
                FillOutcome::Skip
            } else {
                FillOutcome::Filled
            })
        })
        .unwrap();
        assert_eq!(report.skipped, vec![broke]);
        assert_eq!(report.fills[0].resting.order_id, good);
        assert_eq!(report.fills[0].price, d(190));
        assert!(book.contains(&broke));
    }

    #[test]
    fn settle_error_aborts_sweep() {
        let mut book = OrderBook::new(InstrumentId::new());
        rest(&mut book, AccountId::new(), OrderSide::Sell, d(100), 5);
        let buy = Order::dummy_limit(OrderSide::Buy, d(100), 5);
        let err = match_incoming(&mut book, &buy, true, |_, _, _| {
            Err(BourseError::InsufficientFunds {
                needed: Decimal::ONE,
                available: Decimal::ZERO,
            })
        })
        .unwrap_err();
        assert!(matches!(err, BourseError::InsufficientFunds { .. }));
    }

    #[test]
    fn best_counterparty_honours_exclusions() {
        let me = AccountId::new();
        let mut book = OrderBook::new(InstrumentId::new());
        let own = rest(&mut book, me, OrderSide::Sell, d(100), 1);
        let skipped = rest(&mut book, AccountId::new(), OrderSide::Sell, d(100), 1);
        let next = rest(&mut book, AccountId::new(), OrderSide::Sell, d(110), 1);
        let buy = Order::dummy_limit_for(me, OrderSide::Buy, d(120), 3);

        let exclude = HashSet::from([skipped]);
        let best = best_counterparty(&book, &buy, true, &exclude).unwrap();
        assert_eq!(best.order_id, next);
        let best = best_counterparty(&book, &buy, false, &exclude).unwrap();
        assert_eq!(best.order_id, own);
    }

    #[test]
    fn crossing_accounts_sorted_and_unique() {
        let a = AccountId::new();
        let b = AccountId::new();
        let mut book = OrderBook::new(InstrumentId::new());
        rest(&mut book, b, OrderSide::Sell, d(100), 1);
        rest(&mut book, a, OrderSide::Sell, d(101), 1);
        rest(&mut book, b, OrderSide::Sell, d(102), 1);
        rest(&mut book, AccountId::new(), OrderSide::Sell, d(500), 1);
        let buy = Order::dummy_limit(OrderSide::Buy, d(200), 3);

        let accounts = crossing_accounts(&book, &buy);
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(accounts, expected);
    }

    #[test]
    fn random_sweeps_conserve_quantity() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let mut book = OrderBook::new(InstrumentId::new());
            let mut resting_total = 0u64;
            for _ in 0..rng.gen_range(1..20) {
                let qty = rng.gen_range(1..50);
                resting_total += qty;
                rest(&mut book, AccountId::new(), OrderSide::Sell, d(rng.gen_range(50..150)), qty);
            }
            let want = rng.gen_range(1..500);
            let buy = market(AccountId::new(), OrderSide::Buy, want);
            let report = match_incoming(&mut book, &buy, true, always_fill).unwrap();
            let left: u64 = book.ask_levels().map(crate::PriceLevel::total_quantity).sum();
            assert_eq!(report.filled_quantity() + report.remaining, want);
            assert_eq!(report.filled_quantity() + left, resting_total);
            let prices: Vec<Decimal> = report.fills.iter().map(|f| f.price).collect();
            assert!(prices.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
