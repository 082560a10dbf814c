//! Order admission checks.
//!
//! Every order passes the validator before it may touch the book. A
//! failed check rejects the order with a domain error and nothing is
//! mutated:
//!
//! 1. quantity within `(0, max_order_quantity]`
//! 2. the instrument is tradable (TRADING or IPO_FAILED)
//! 3. SELL: enough available shares to lock the full quantity
//! 4. BUY: approximate affordability at admission; the exact debit
//!    happens per fill

use bourse_matchcore::OrderBook;
use bourse_types::{
    Account, BourseError, EngineConfig, Holding, Instrument, Order, OrderSide, OrderType, Result,
};
use rust_decimal::Decimal;

use crate::fees::fee_for;

/// Admission gate for the order book.
#[derive(Debug, Clone)]
pub struct OrderValidator {
    max_order_quantity: u64,
    fee_rate: Decimal,
    self_trade_prevention: bool,
}

impl OrderValidator {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_order_quantity: config.max_order_quantity,
            fee_rate: config.fee_rate,
            self_trade_prevention: config.self_trade_prevention,
        }
    }

    /// Size limits.
    pub fn check_quantity(&self, quantity: u64) -> Result<()> {
        if quantity == 0 {
            return Err(BourseError::InvalidOrderParameters {
                reason: "quantity must be positive".to_string(),
            });
        }
        if quantity > self.max_order_quantity {
            return Err(BourseError::InvalidOrderParameters {
                reason: format!(
                    "quantity {quantity} exceeds maximum {}",
                    self.max_order_quantity
                ),
            });
        }
        Ok(())
    }

    /// The book is open for this instrument.
    pub fn check_instrument(&self, instrument: &Instrument) -> Result<()> {
        if !instrument.status().is_tradable() {
            return Err(BourseError::InstrumentNotTradable {
                instrument: instrument.id,
                status: instrument.status(),
            });
        }
        Ok(())
    }

    /// Full admission check for `order`.
    ///
    /// `holding` is the placing account's position (`None` if it has
    /// never held the instrument); `book` is the instrument's book as
    /// seen inside the admission transaction.
    pub fn validate(
        &self,
        order: &Order,
        instrument: &Instrument,
        account: &Account,
        holding: Option<&Holding>,
        book: &OrderBook,
    ) -> Result<()> {
        self.check_quantity(order.quantity)?;
        self.check_instrument(instrument)?;
        match order.side {
            OrderSide::Sell => {
                let available = holding.map_or(0, Holding::available);
                if available < order.quantity {
                    return Err(BourseError::InsufficientShares {
                        needed: order.quantity,
                        available,
                    });
                }
            }
            OrderSide::Buy => {
                let needed = self.estimated_buy_cost(order, book);
                if account.balance() < needed {
                    return Err(BourseError::InsufficientFunds {
                        needed,
                        available: account.balance(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Upper estimate of what a BUY will pay, fees included.
    ///
    /// LIMIT: the whole quantity at the limit price (fills never execute
    /// above it). MARKET: the visible asks walked in priority order up to
    /// the quantity; liquidity that is not there cannot be paid for.
    #[must_use]
    pub fn estimated_buy_cost(&self, order: &Order, book: &OrderBook) -> Decimal {
        let notional = match (order.order_type, order.limit_price) {
            (OrderType::Limit, Some(limit)) => limit * Decimal::from(order.quantity),
            _ => {
                let mut left = order.quantity;
                let mut notional = Decimal::ZERO;
                for entry in book.entries(OrderSide::Sell) {
                    if left == 0 {
                        break;
                    }
                    if self.self_trade_prevention && entry.account_id == order.account_id {
                        continue;
                    }
                    let take = left.min(entry.remaining);
                    notional += entry.price * Decimal::from(take);
                    left -= take;
                }
                notional
            }
        };
        notional + fee_for(notional, self.fee_rate)
    }
}

#[cfg(test)]
mod tests {
    use bourse_types::*;
    use chrono::Utc;

    use super::*;

    fn validator() -> OrderValidator {
        OrderValidator::new(&EngineConfig::default())
    }

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 2)
    }

    #[test]
    fn rejects_oversized_orders() {
        let v = validator();
        assert!(v.check_quantity(0).is_err());
        assert!(v.check_quantity(1).is_ok());
        assert!(v.check_quantity(1_000_001).is_err());
    }

    #[test]
    fn auction_instruments_are_not_tradable() {
        let v = validator();
        let err = v
            .check_instrument(&Instrument::dummy(InstrumentStatus::IpoActive))
            .unwrap_err();
        assert!(matches!(err, BourseError::InstrumentNotTradable { .. }));
        assert!(v.check_instrument(&Instrument::dummy(InstrumentStatus::Trading)).is_ok());
        assert!(v.check_instrument(&Instrument::dummy(InstrumentStatus::IpoFailed)).is_ok());
    }

    #[test]
    fn sell_needs_available_shares() {
        let v = validator();
        let instrument = Instrument::dummy(InstrumentStatus::Trading);
        let account = Account::dummy_funded(Decimal::ZERO);
        let book = OrderBook::new(instrument.id);
        let order = Order::dummy_limit_for(account.id, OrderSide::Sell, d(200), 5);

        let err = v.validate(&order, &instrument, &account, None, &book).unwrap_err();
        assert!(matches!(err, BourseError::InsufficientShares { needed: 5, available: 0 }));

        let mut holding = Holding::empty(account.id, instrument.id);
        holding.grant_locked(10, Decimal::ZERO);
        holding.unlock(4).unwrap();
        assert!(v.validate(&order, &instrument, &account, Some(&holding), &book).is_err());
        holding.unlock(1).unwrap();
        assert!(v.validate(&order, &instrument, &account, Some(&holding), &book).is_ok());
    }

    #[test]
    fn limit_buy_affordability_includes_fee() {
        let v = validator();
        let instrument = Instrument::dummy(InstrumentStatus::Trading);
        let book = OrderBook::new(instrument.id);
        let poor = Account::dummy_funded(Decimal::new(10, 0));
        let order = Order::dummy_limit_for(poor.id, OrderSide::Buy, d(200), 5);
        assert_eq!(v.estimated_buy_cost(&order, &book), Decimal::new(1005, 2));
        assert!(v.validate(&order, &instrument, &poor, None, &book).is_err());

        let ok = Account::dummy_funded(Decimal::new(1005, 2));
        let order = Order::dummy_limit_for(ok.id, OrderSide::Buy, d(200), 5);
        assert!(v.validate(&order, &instrument, &ok, None, &book).is_ok());
    }

    #[test]
    fn market_buy_estimate_walks_asks() {
        let v = validator();
        let instrument = Instrument::dummy(InstrumentStatus::Trading);
        let mut book = OrderBook::new(instrument.id);
        book.rest(&Order::dummy_limit(OrderSide::Sell, d(100), 10)).unwrap();
        book.rest(&Order::dummy_limit(OrderSide::Sell, d(200), 20)).unwrap();

        let request = OrderRequest::market(instrument.id, OrderSide::Buy, 100);
        let order = Order::new(AccountId::new(), &request, 0, Utc::now()).unwrap();
        // 10 * 1.00 + 20 * 2.00 = 50.00, plus 0.5%
        assert_eq!(v.estimated_buy_cost(&order, &book), Decimal::new(5025, 2));
    }
}
