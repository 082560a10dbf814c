//! Account opening and the daily login bonus.

use bourse_ledger::{PostingDetails, credit};
use bourse_types::{Account, AccountId, BourseError, LedgerEntry, LedgerEntryKind, Result};
use rust_decimal::Decimal;
use tracing::info;

use crate::Exchange;

impl Exchange {
    /// Open an account funded with the configured starting balance.
    pub fn open_account(&self, display_name: &str) -> Result<Account> {
        let starting = self.config.starting_balance;
        let account = self.run("open_account", |tx| {
            let now = self.now();
            let id = tx.create_account(Account::open(display_name, now));
            if starting > Decimal::ZERO {
                tx.post(id, |account, head| {
                    credit(
                        account,
                        starting,
                        LedgerEntryKind::Deposit,
                        PostingDetails::new("starting balance"),
                        head,
                        now,
                    )
                })?;
            }
            Ok(tx.account(id)?.clone())
        })?;
        info!(account = %account.id, name = display_name, balance = %account.balance(), "account opened");
        Ok(account)
    }

    /// Credit the login bonus, at most once per UTC calendar day.
    ///
    /// # Errors
    /// `BonusAlreadyClaimed` on a second claim the same day.
    pub fn claim_login_bonus(&self, account_id: AccountId) -> Result<LedgerEntry> {
        let bonus = self.config.login_bonus;
        self.run("claim_login_bonus", |tx| {
            let now = self.now();
            let today = now.date_naive();
            tx.lock_accounts([account_id])?;
            if tx.account(account_id)?.bonus_claimed_on(today) {
                return Err(BourseError::BonusAlreadyClaimed(account_id));
            }
            let entry = tx.post(account_id, |account, head| {
                credit(
                    account,
                    bonus,
                    LedgerEntryKind::LoginBonus,
                    PostingDetails::new("daily login bonus"),
                    head,
                    now,
                )
            })?;
            tx.account_mut(account_id)?.last_bonus_on = Some(today);
            Ok(entry)
        })
    }
}
