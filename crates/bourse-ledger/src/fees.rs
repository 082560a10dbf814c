//! Flat fee model.
//!
//! Each side of a trade bears its own fee leg, `notional * fee_rate`.
//! The paying side's cost is `notional + fee`; the receiving side nets
//! `notional - fee`. Fees are not rounded.

use rust_decimal::Decimal;

/// Per-fill money movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillCosts {
    pub notional: Decimal,
    pub buyer_fee: Decimal,
    pub seller_fee: Decimal,
}

impl FillCosts {
    /// Debited from the buyer.
    #[must_use]
    pub fn buyer_cost(&self) -> Decimal {
        self.notional + self.buyer_fee
    }

    /// Credited to the seller.
    #[must_use]
    pub fn seller_proceeds(&self) -> Decimal {
        self.notional - self.seller_fee
    }
}

/// Fee on `notional` at `rate`.
#[must_use]
pub fn fee_for(notional: Decimal, rate: Decimal) -> Decimal {
    notional * rate
}

/// Costs of `quantity` shares at `price`.
#[must_use]
pub fn fill_costs(quantity: u64, price: Decimal, rate: Decimal) -> FillCosts {
    let notional = price * Decimal::from(quantity);
    let fee = fee_for(notional, rate);
    FillCosts {
        notional,
        buyer_fee: fee,
        seller_fee: fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate() -> Decimal {
        Decimal::new(5, 3)
    }

    #[test]
    fn ipo_reference_purchase() {
        let costs = fill_costs(10, Decimal::new(105, 2), rate());
        assert_eq!(costs.notional, Decimal::new(1050, 2));
        assert_eq!(costs.buyer_fee, Decimal::new(525, 4));
        assert_eq!(costs.buyer_cost(), Decimal::new(105_525, 4));
    }

    #[test]
    fn both_legs_charged() {
        let costs = fill_costs(5, Decimal::new(2, 0), rate());
        assert_eq!(costs.buyer_cost(), Decimal::new(1005, 2));
        assert_eq!(costs.seller_proceeds(), Decimal::new(995, 2));
    }

    #[test]
    fn zero_rate_is_free() {
        let costs = fill_costs(3, Decimal::ONE, Decimal::ZERO);
        assert_eq!(costs.buyer_cost(), costs.seller_proceeds());
    }
}
