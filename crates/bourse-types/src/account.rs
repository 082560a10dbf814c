//! Account model: a fungible balance that can never go negative.
//!
//! Balance fields are private; the only mutators are [`Account::withdraw`]
//! and [`Account::deposit`], which the ledger wraps with audit entries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, BourseError, Result};

/// Before/after snapshot of a single balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub before: Decimal,
    pub after: Decimal,
}

/// A trading account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub display_name: String,
    balance: Decimal,
    lifetime_earnings: Decimal,
    pub last_activity_at: DateTime<Utc>,
    /// UTC day of the most recent login bonus, if any.
    pub last_bonus_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open an empty account. Funding goes through the ledger.
    #[must_use]
    pub fn open(display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: AccountId::new(),
            display_name: display_name.into(),
            balance: Decimal::ZERO,
            lifetime_earnings: Decimal::ZERO,
            last_activity_at: now,
            last_bonus_on: None,
            created_at: now,
        }
    }

    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    #[must_use]
    pub fn lifetime_earnings(&self) -> Decimal {
        self.lifetime_earnings
    }

    /// Decrease the balance.
    ///
    /// # Errors
    /// `InsufficientFunds` if the balance is below `amount`; the account is
    /// left untouched.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<BalanceChange> {
        ensure_non_negative(amount)?;
        if self.balance < amount {
            return Err(BourseError::InsufficientFunds {
                needed: amount,
                available: self.balance,
            });
        }
        let before = self.balance;
        self.balance -= amount;
        Ok(BalanceChange {
            before,
            after: self.balance,
        })
    }

    /// Increase the balance.
    pub fn deposit(&mut self, amount: Decimal) -> Result<BalanceChange> {
        ensure_non_negative(amount)?;
        let before = self.balance;
        self.balance += amount;
        Ok(BalanceChange {
            before,
            after: self.balance,
        })
    }

    /// Count income (trade proceeds, bonuses) towards lifetime earnings.
    pub fn record_earnings(&mut self, amount: Decimal) {
        if amount.is_sign_positive() {
            self.lifetime_earnings += amount;
        }
    }

    /// Whether a login bonus was already credited on `today`.
    #[must_use]
    pub fn bonus_claimed_on(&self, today: NaiveDate) -> bool {
        self.last_bonus_on == Some(today)
    }
}

fn ensure_non_negative(amount: Decimal) -> Result<()> {
    if amount.is_sign_negative() {
        return Err(BourseError::InvalidAmount {
            reason: format!("amount must be non-negative, got {amount}"),
        });
    }
    Ok(())
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Account {
    /// An account with `balance` already in place, bypassing the ledger.
    pub fn dummy_funded(balance: Decimal) -> Self {
        let mut account = Self::open("dummy", Utc::now());
        account.balance = balance;
        account
    }
}
