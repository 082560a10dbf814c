//! Balance debit / credit with audit entries.
//!
//! Each call mutates the [`Account`] and returns the [`LedgerEntry`]
//! recording it. Callers persist both in the transaction of the business
//! action that caused them; a failed debit leaves the account untouched
//! and produces no entry.

use bourse_types::{
    Account, InstrumentId, LedgerEntry, LedgerEntryId, LedgerEntryKind, Result, TradeId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::chain::compute_digest;

/// Optional context recorded on an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingDetails {
    pub instrument_id: Option<InstrumentId>,
    pub quantity: Option<u64>,
    pub price: Option<Decimal>,
    pub fee: Decimal,
    pub reference: Option<TradeId>,
    pub description: String,
}

impl PostingDetails {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn instrument(mut self, instrument_id: InstrumentId) -> Self {
        self.instrument_id = Some(instrument_id);
        self
    }

    #[must_use]
    pub fn shares(mut self, quantity: u64, price: Decimal) -> Self {
        self.quantity = Some(quantity);
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    #[must_use]
    pub fn reference(mut self, trade_id: TradeId) -> Self {
        self.reference = Some(trade_id);
        self
    }
}

/// Take `amount` from `account`.
///
/// `head` is the digest of the account's latest entry.
///
/// # Errors
/// `InsufficientFunds` if the balance is below `amount`;
/// `InvalidAmount` if `amount` is negative.
pub fn debit(
    account: &mut Account,
    amount: Decimal,
    kind: LedgerEntryKind,
    details: PostingDetails,
    head: [u8; 32],
    now: DateTime<Utc>,
) -> Result<LedgerEntry> {
    let change = account.withdraw(amount)?;
    account.last_activity_at = now;
    let entry = seal(account, -amount, kind, details, change.before, change.after, head, now);
    debug!(account = %account.id, %amount, %kind, balance = %change.after, "debit");
    Ok(entry)
}

/// Give `amount` to `account`.
///
/// Trade proceeds and login bonuses also count towards lifetime earnings.
///
/// # Errors
/// `InvalidAmount` if `amount` is negative.
pub fn credit(
    account: &mut Account,
    amount: Decimal,
    kind: LedgerEntryKind,
    details: PostingDetails,
    head: [u8; 32],
    now: DateTime<Utc>,
) -> Result<LedgerEntry> {
    let change = account.deposit(amount)?;
    if kind.counts_as_earnings() {
        account.record_earnings(amount);
    }
    account.last_activity_at = now;
    let entry = seal(account, amount, kind, details, change.before, change.after, head, now);
    debug!(account = %account.id, %amount, %kind, balance = %change.after, "credit");
    Ok(entry)
}

#[allow(clippy::too_many_arguments)]
fn seal(
    account: &Account,
    signed_amount: Decimal,
    kind: LedgerEntryKind,
    details: PostingDetails,
    balance_before: Decimal,
    balance_after: Decimal,
    head: [u8; 32],
    now: DateTime<Utc>,
) -> LedgerEntry {
    let mut entry = LedgerEntry {
        id: LedgerEntryId::new(),
        account_id: account.id,
        kind,
        instrument_id: details.instrument_id,
        quantity: details.quantity,
        price: details.price,
        amount: signed_amount,
        fee: details.fee,
        balance_before,
        balance_after,
        description: details.description,
        reference: details.reference,
        created_at: now,
        prev_digest: head,
        digest: [0u8; 32],
    };
    entry.digest = compute_digest(&entry);
    entry
}
