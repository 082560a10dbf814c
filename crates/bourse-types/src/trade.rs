//! Trade records.
//!
//! A [`Trade`] is the immutable record of one execution: either a
//! peer-to-peer fill between two orders, or an IPO purchase from the
//! auction pool (no seller account, no order references).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, InstrumentId, OrderId, TradeId};

/// An executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub instrument_id: InstrumentId,
    pub buyer: AccountId,
    /// `None` when the counterparty is the IPO auction pool.
    pub seller: Option<AccountId>,
    pub quantity: u64,
    /// Execution price per share.
    pub price: Decimal,
    /// `price × quantity`.
    pub total_value: Decimal,
    pub buyer_fee: Decimal,
    pub seller_fee: Decimal,
    pub is_ipo: bool,
    pub buy_order_id: Option<OrderId>,
    pub sell_order_id: Option<OrderId>,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    /// Purchase from the auction pool.
    #[must_use]
    pub fn ipo(
        instrument_id: InstrumentId,
        buyer: AccountId,
        quantity: u64,
        price: Decimal,
        total_value: Decimal,
        buyer_fee: Decimal,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TradeId::new(),
            instrument_id,
            buyer,
            seller: None,
            quantity,
            price,
            total_value,
            buyer_fee,
            seller_fee: Decimal::ZERO,
            is_ipo: true,
            buy_order_id: None,
            sell_order_id: None,
            executed_at,
        }
    }

    /// Amount the buyer paid including fee.
    #[must_use]
    pub fn buyer_cost(&self) -> Decimal {
        self.total_value + self.buyer_fee
    }

    /// Amount the seller received net of fee.
    #[must_use]
    pub fn seller_proceeds(&self) -> Decimal {
        self.total_value - self.seller_fee
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_ipo { "IPO" } else { "BOOK" };
        write!(
            f,
            "Trade[{}] {} {} {} @ {} = {}",
            self.id, kind, self.instrument_id, self.quantity, self.price, self.total_value,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ipo_trade() -> Trade {
        Trade::ipo(
            InstrumentId::new(),
            AccountId::new(),
            10,
            Decimal::new(105, 2),
            Decimal::new(1050, 2),
            Decimal::new(525, 4),
            Utc::now(),
        )
    }

    #[test]
    fn ipo_trade_has_pool_counterparty() {
        let t = make_ipo_trade();
        assert!(t.is_ipo);
        assert!(t.seller.is_none());
        assert!(t.buy_order_id.is_none() && t.sell_order_id.is_none());
    }

    #[test]
    fn buyer_cost_includes_fee() {
        let t = make_ipo_trade();
        assert_eq!(t.buyer_cost(), Decimal::new(105_525, 4));
    }

    #[test]
    fn trade_display() {
        let s = format!("{}", make_ipo_trade());
        assert!(s.contains("IPO"));
        assert!(s.contains("10.50"));
    }

    #[test]
    fn trade_serde_roundtrip() {
        let trade = make_ipo_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
    }
}
