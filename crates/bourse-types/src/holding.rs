//! Per-(account, instrument) share position.
//!
//! The position is stored as `available` and `locked` only; `quantity` is
//! derived, so `quantity == available + locked` holds by construction.
//! `locked` covers both unvested creator shares and shares reserved by
//! open sell orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, BourseError, InstrumentId, Result, constants};

/// An account's position in one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    available: u64,
    locked: u64,
    average_cost: Decimal,
}

impl Holding {
    /// An empty position.
    #[must_use]
    pub fn empty(account_id: AccountId, instrument_id: InstrumentId) -> Self {
        Self {
            account_id,
            instrument_id,
            available: 0,
            locked: 0,
            average_cost: Decimal::ZERO,
        }
    }

    /// Rebuild a position from stored parts.
    ///
    /// # Errors
    /// `InvariantViolation` if `quantity != available + locked`.
    pub fn from_parts(
        account_id: AccountId,
        instrument_id: InstrumentId,
        quantity: u64,
        available: u64,
        locked: u64,
        average_cost: Decimal,
    ) -> Result<Self> {
        if available.checked_add(locked) != Some(quantity) {
            return Err(BourseError::InvariantViolation {
                reason: format!(
                    "holding quantity {quantity} != available {available} + locked {locked}"
                ),
            });
        }
        Ok(Self {
            account_id,
            instrument_id,
            available,
            locked,
            average_cost,
        })
    }

    #[must_use]
    pub fn quantity(&self) -> u64 {
        self.available + self.locked
    }

    #[must_use]
    pub fn available(&self) -> u64 {
        self.available
    }

    #[must_use]
    pub fn locked(&self) -> u64 {
        self.locked
    }

    #[must_use]
    pub fn average_cost(&self) -> Decimal {
        self.average_cost
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantity() == 0
    }

    /// Add tradeable shares bought at `unit_price`, merging the cost basis.
    pub fn acquire(&mut self, quantity: u64, unit_price: Decimal) {
        self.merge_cost(quantity, unit_price);
        self.available += quantity;
    }

    /// Add shares that start locked (creator grant).
    pub fn grant_locked(&mut self, quantity: u64, unit_price: Decimal) {
        self.merge_cost(quantity, unit_price);
        self.locked += quantity;
    }

    /// Reserve shares for an order (available → locked).
    ///
    /// # Errors
    /// `InsufficientShares` if fewer than `quantity` are available.
    pub fn lock(&mut self, quantity: u64) -> Result<()> {
        if self.available < quantity {
            return Err(BourseError::InsufficientShares {
                needed: quantity,
                available: self.available,
            });
        }
        self.available -= quantity;
        self.locked += quantity;
        Ok(())
    }

    /// Return reserved or vested shares to available (locked → available).
    ///
    /// # Errors
    /// `InvariantViolation` if fewer than `quantity` are locked.
    pub fn unlock(&mut self, quantity: u64) -> Result<()> {
        if self.locked < quantity {
            return Err(BourseError::InvariantViolation {
                reason: format!(
                    "unlock of {quantity} exceeds locked {} for {}",
                    self.locked, self.account_id
                ),
            });
        }
        self.locked -= quantity;
        self.available += quantity;
        Ok(())
    }

    /// Deliver locked shares to a buyer (locked → gone).
    ///
    /// # Errors
    /// `InsufficientShares` if fewer than `quantity` are locked.
    pub fn release_locked(&mut self, quantity: u64) -> Result<()> {
        if self.locked < quantity {
            return Err(BourseError::InsufficientShares {
                needed: quantity,
                available: self.locked,
            });
        }
        self.locked -= quantity;
        self.reset_cost_if_empty();
        Ok(())
    }

    /// Take back available shares (IPO refund).
    ///
    /// # Errors
    /// `InsufficientShares` if fewer than `quantity` are available.
    pub fn surrender(&mut self, quantity: u64) -> Result<()> {
        if self.available < quantity {
            return Err(BourseError::InsufficientShares {
                needed: quantity,
                available: self.available,
            });
        }
        self.available -= quantity;
        self.reset_cost_if_empty();
        Ok(())
    }

    fn merge_cost(&mut self, quantity: u64, unit_price: Decimal) {
        let held = Decimal::from(self.quantity());
        let added = Decimal::from(quantity);
        let total = held + added;
        if total.is_zero() {
            return;
        }
        self.average_cost = ((self.average_cost * held + unit_price * added) / total)
            .round_dp(constants::COST_BASIS_PRECISION);
    }

    fn reset_cost_if_empty(&mut self) {
        if self.is_empty() {
            self.average_cost = Decimal::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding() -> Holding {
        Holding::empty(AccountId::new(), InstrumentId::new())
    }

    #[test]
    fn from_parts_enforces_sum() {
        let ok = Holding::from_parts(AccountId::new(), InstrumentId::new(), 10, 7, 3, Decimal::ONE);
        assert!(ok.is_ok());
        let bad = Holding::from_parts(AccountId::new(), InstrumentId::new(), 10, 7, 4, Decimal::ONE);
        assert!(matches!(bad, Err(BourseError::InvariantViolation { .. })));
    }

    #[test]
    fn acquire_merges_average_cost() {
        let mut h = holding();
        h.acquire(10, Decimal::new(200, 2));
        h.acquire(10, Decimal::new(100, 2));
        assert_eq!(h.quantity(), 20);
        assert_eq!(h.average_cost(), Decimal::new(150, 2));
    }

    #[test]
    fn lock_then_unlock_round_trips() {
        let mut h = holding();
        h.acquire(20, Decimal::ONE);
        h.lock(20).unwrap();
        assert_eq!((h.available(), h.locked()), (0, 20));
        h.unlock(20).unwrap();
        assert_eq!((h.available(), h.locked()), (20, 0));
        assert_eq!(h.quantity(), 20);
    }

    #[test]
    fn lock_more_than_available_fails() {
        let mut h = holding();
        h.grant_locked(20, Decimal::ZERO);
        h.acquire(5, Decimal::ONE);
        let err = h.lock(6).unwrap_err();
        assert!(matches!(err, BourseError::InsufficientShares { needed: 6, available: 5 }));
        assert_eq!((h.available(), h.locked()), (5, 20));
    }

    #[test]
    fn release_and_surrender_empty_the_position() {
        let mut h = holding();
        h.acquire(10, Decimal::ONE);
        h.lock(4).unwrap();
        h.release_locked(4).unwrap();
        h.surrender(6).unwrap();
        assert!(h.is_empty());
        assert_eq!(h.average_cost(), Decimal::ZERO);
    }
}
