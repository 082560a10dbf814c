//! Instrument model and its IPO lifecycle.
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────────┐  sold out / threshold met  ┌─────────┐
//!   │ IPO_ACTIVE ├───────────────────────────▶│ TRADING │
//!   └─────┬──────┘                            └─────────┘
//!         │ expired below threshold
//!         ▼
//!   ┌────────────┐
//!   │ IPO_FAILED │
//!   └────────────┘
//! ```
//!
//! Both exits are terminal. `ipo_shares_sold` can only move while the
//! instrument is IPO_ACTIVE, so it is frozen afterwards.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, BourseError, InstrumentId, IpoConfig, Result, Symbol};

/// Lifecycle status of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentStatus {
    IpoActive,
    Trading,
    IpoFailed,
}

impl InstrumentStatus {
    /// Can this status transition to the given target?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::IpoActive, Self::Trading | Self::IpoFailed)
        )
    }

    /// Peer-to-peer orders are admitted in these states.
    #[must_use]
    pub fn is_tradable(&self) -> bool {
        matches!(self, Self::Trading | Self::IpoFailed)
    }
}

impl std::fmt::Display for InstrumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IpoActive => write!(f, "IPO_ACTIVE"),
            Self::Trading => write!(f, "TRADING"),
            Self::IpoFailed => write!(f, "IPO_FAILED"),
        }
    }
}

/// Dutch-auction terms fixed at listing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpoTerms {
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub duration_hours: u32,
    pub shares_offered: u64,
    /// Fraction of `shares_offered` that must sell for the IPO to succeed.
    pub success_threshold: Decimal,
}

impl From<&IpoConfig> for IpoTerms {
    fn from(cfg: &IpoConfig) -> Self {
        Self {
            start_price: cfg.start_price,
            end_price: cfg.end_price,
            duration_hours: cfg.duration_hours,
            shares_offered: cfg.shares_offered,
            success_threshold: cfg.success_threshold,
        }
    }
}

/// A listed instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub symbol: Symbol,
    pub name: String,
    pub creator: AccountId,
    pub total_supply: u64,
    pub outstanding_shares: u64,
    status: InstrumentStatus,
    pub ipo: IpoTerms,
    pub ipo_started_at: DateTime<Utc>,
    pub ipo_ends_at: DateTime<Utc>,
    ipo_shares_sold: u64,
    /// Last auction price published by the pricing tick (display only).
    pub current_ipo_price: Decimal,
    pub last_trade_price: Option<Decimal>,
    pub trade_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Instrument {
    /// List a new instrument in IPO_ACTIVE.
    ///
    /// `outstanding_shares` starts at the creator allocation; auction
    /// sales add to it.
    #[must_use]
    pub fn list(
        symbol: Symbol,
        name: impl Into<String>,
        creator: AccountId,
        terms: IpoTerms,
        creator_shares: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let ends = now + Duration::hours(i64::from(terms.duration_hours));
        Self {
            id: InstrumentId::new(),
            symbol,
            name: name.into(),
            creator,
            total_supply: terms.shares_offered + creator_shares,
            outstanding_shares: creator_shares,
            status: InstrumentStatus::IpoActive,
            current_ipo_price: terms.start_price,
            ipo: terms,
            ipo_started_at: now,
            ipo_ends_at: ends,
            ipo_shares_sold: 0,
            last_trade_price: None,
            trade_count: 0,
            created_at: now,
        }
    }

    #[must_use]
    pub fn status(&self) -> InstrumentStatus {
        self.status
    }

    #[must_use]
    pub fn ipo_shares_sold(&self) -> u64 {
        self.ipo_shares_sold
    }

    #[must_use]
    pub fn ipo_shares_remaining(&self) -> u64 {
        self.ipo.shares_offered.saturating_sub(self.ipo_shares_sold)
    }

    #[must_use]
    pub fn is_sold_out(&self) -> bool {
        self.ipo_shares_sold >= self.ipo.shares_offered
    }

    #[must_use]
    pub fn is_auction_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.ipo_ends_at
    }

    /// Shares that must be sold for the IPO to succeed (rounded up).
    #[must_use]
    pub fn success_quantity(&self) -> u64 {
        use rust_decimal::prelude::ToPrimitive;
        (Decimal::from(self.ipo.shares_offered) * self.ipo.success_threshold)
            .ceil()
            .to_u64()
            .unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn reached_success_threshold(&self) -> bool {
        self.ipo_shares_sold >= self.success_quantity()
    }

    /// Move to a terminal status.
    ///
    /// # Errors
    /// `InvalidStatusTransition` unless the instrument is IPO_ACTIVE and the
    /// target is TRADING or IPO_FAILED.
    pub fn transition_to(&mut self, target: InstrumentStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(BourseError::InvalidStatusTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }

    /// Record shares sold from the auction pool.
    ///
    /// # Errors
    /// - `AuctionNotActive` outside IPO_ACTIVE
    /// - `QuantityExceedsAvailable` if fewer than `quantity` shares remain
    pub fn record_ipo_sale(&mut self, quantity: u64) -> Result<()> {
        if self.status != InstrumentStatus::IpoActive {
            return Err(BourseError::AuctionNotActive {
                instrument: self.id,
                status: self.status,
            });
        }
        let remaining = self.ipo_shares_remaining();
        if quantity > remaining {
            return Err(BourseError::QuantityExceedsAvailable {
                requested: quantity,
                available: remaining,
            });
        }
        self.ipo_shares_sold += quantity;
        self.outstanding_shares += quantity;
        Ok(())
    }

    /// Shares handed back to the auction pool by a refund.
    ///
    /// `ipo_shares_sold` stays frozen; only the outstanding count shrinks.
    pub fn retire_refunded_shares(&mut self, quantity: u64) -> Result<()> {
        if self.status != InstrumentStatus::IpoFailed {
            return Err(BourseError::InvalidStatusTransition {
                from: self.status,
                to: InstrumentStatus::IpoFailed,
            });
        }
        self.outstanding_shares = self.outstanding_shares.checked_sub(quantity).ok_or_else(|| {
            BourseError::InvariantViolation {
                reason: format!(
                    "refund of {quantity} exceeds outstanding {} on {}",
                    self.outstanding_shares, self.id
                ),
            }
        })?;
        Ok(())
    }

    /// Record a matched peer-to-peer trade.
    pub fn record_trade(&mut self, price: Decimal) {
        self.last_trade_price = Some(price);
        self.trade_count += 1;
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Instrument {
    pub fn dummy(status: InstrumentStatus) -> Self {
        let cfg = IpoConfig::default();
        let mut instrument = Self::list(
            Symbol::parse("TEST").unwrap(),
            "Test Instrument",
            AccountId::new(),
            IpoTerms::from(&cfg),
            cfg.creator_shares,
            Utc::now(),
        );
        instrument.status = status;
        instrument
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_one_way() {
        assert!(InstrumentStatus::IpoActive.can_transition_to(InstrumentStatus::Trading));
        assert!(InstrumentStatus::IpoActive.can_transition_to(InstrumentStatus::IpoFailed));
        assert!(!InstrumentStatus::Trading.can_transition_to(InstrumentStatus::IpoActive));
        assert!(!InstrumentStatus::IpoFailed.can_transition_to(InstrumentStatus::Trading));
        assert!(!InstrumentStatus::Trading.can_transition_to(InstrumentStatus::IpoFailed));
    }

    #[test]
    fn listing_sets_supply_and_window() {
        let inst = Instrument::dummy(InstrumentStatus::IpoActive);
        assert_eq!(inst.total_supply, 1000);
        assert_eq!(inst.outstanding_shares, 20);
        assert_eq!(inst.ipo_ends_at - inst.ipo_started_at, Duration::hours(24));
        assert_eq!(inst.success_quantity(), 490);
    }

    #[test]
    fn ipo_sale_bounded_by_offer() {
        let mut inst = Instrument::dummy(InstrumentStatus::IpoActive);
        inst.record_ipo_sale(900).unwrap();
        let err = inst.record_ipo_sale(81).unwrap_err();
        assert!(matches!(
            err,
            BourseError::QuantityExceedsAvailable { requested: 81, available: 80 }
        ));
        inst.record_ipo_sale(80).unwrap();
        assert!(inst.is_sold_out());
        assert_eq!(inst.outstanding_shares, 1000);
    }

    #[test]
    fn ipo_sales_frozen_after_resolution() {
        let mut inst = Instrument::dummy(InstrumentStatus::IpoActive);
        inst.record_ipo_sale(10).unwrap();
        inst.transition_to(InstrumentStatus::Trading).unwrap();
        assert!(inst.record_ipo_sale(1).is_err());
        assert_eq!(inst.ipo_shares_sold(), 10);
        assert!(inst.transition_to(InstrumentStatus::IpoFailed).is_err());
    }

    #[test]
    fn refund_retires_outstanding_only() {
        let mut inst = Instrument::dummy(InstrumentStatus::IpoActive);
        inst.record_ipo_sale(400).unwrap();
        inst.transition_to(InstrumentStatus::IpoFailed).unwrap();
        inst.retire_refunded_shares(400).unwrap();
        assert_eq!(inst.ipo_shares_sold(), 400);
        assert_eq!(inst.outstanding_shares, 20);
    }
}
