//! Audit trail entries for balance-affecting events.
//!
//! Entries are append-only. Per account they form a causal chain:
//! each entry's `balance_before` equals the previous entry's
//! `balance_after`, and `digest` commits to the previous entry's digest.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, InstrumentId, LedgerEntryId, TradeId};

/// Predecessor digest of an account's first entry.
pub const GENESIS_DIGEST: [u8; 32] = [0u8; 32];

/// What kind of event produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEntryKind {
    /// Opening balance or administrative top-up.
    Deposit,
    /// Daily login bonus.
    LoginBonus,
    /// Fee paid to list a new instrument.
    SubmissionFee,
    /// Shares bought from the IPO auction pool.
    IpoPurchase,
    /// Reversal of an IPO purchase after the auction failed.
    IpoRefund,
    /// Buy side of a matched trade.
    TradeBuy,
    /// Sell side of a matched trade.
    TradeSell,
}

impl LedgerEntryKind {
    /// Whether a credit of this kind counts towards lifetime earnings.
    #[must_use]
    pub fn counts_as_earnings(&self) -> bool {
        matches!(self, Self::TradeSell | Self::LoginBonus)
    }
}

impl std::fmt::Display for LedgerEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "DEPOSIT"),
            Self::LoginBonus => write!(f, "LOGIN_BONUS"),
            Self::SubmissionFee => write!(f, "SUBMISSION_FEE"),
            Self::IpoPurchase => write!(f, "IPO_PURCHASE"),
            Self::IpoRefund => write!(f, "IPO_REFUND"),
            Self::TradeBuy => write!(f, "TRADE_BUY"),
            Self::TradeSell => write!(f, "TRADE_SELL"),
        }
    }
}

/// An immutable audit record of a single balance-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub account_id: AccountId,
    pub kind: LedgerEntryKind,
    pub instrument_id: Option<InstrumentId>,
    pub quantity: Option<u64>,
    pub price: Option<Decimal>,
    /// Signed balance movement: negative for debits, positive for credits.
    pub amount: Decimal,
    /// Fee included in `amount` (always non-negative).
    pub fee: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    /// Trade this entry settles or reverses, if any.
    pub reference: Option<TradeId>,
    pub created_at: DateTime<Utc>,
    /// Digest of the previous entry of the same account (zeroes for the first).
    pub prev_digest: [u8; 32],
    /// SHA-256 over `prev_digest` and this entry's fields.
    pub digest: [u8; 32],
}

impl LedgerEntry {
    #[must_use]
    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative()
    }
}

impl std::fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} ({} -> {}): {}",
            self.account_id,
            self.kind,
            self.amount,
            self.balance_before,
            self.balance_after,
            self.description
        )
    }
}
