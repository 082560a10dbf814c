//! Read-only query surface.
//!
//! Snapshot reads at a commit boundary; none of these take row locks.

use bourse_ledger::verify_chain;
use bourse_matchcore::{BookSnapshot, price_at};
use bourse_types::{
    Account, AccountId, BourseError, Holding, Instrument, InstrumentId, InstrumentStatus,
    LedgerEntry, Order, OrderId, Result, Symbol, Trade,
};
use rust_decimal::Decimal;

use crate::Exchange;

impl Exchange {
    /// Aggregated book, `depth` levels per side.
    pub fn get_order_book(&self, instrument_id: InstrumentId, depth: usize) -> Result<BookSnapshot> {
        self.store.book_snapshot(instrument_id, depth)
    }

    pub fn get_instrument(&self, instrument_id: InstrumentId) -> Result<Instrument> {
        self.store.instrument(instrument_id)
    }

    pub fn find_instrument(&self, symbol: &str) -> Result<Instrument> {
        self.store.instrument_by_symbol(&Symbol::parse(symbol)?)
    }

    /// All instruments, oldest listing first.
    pub fn list_instruments(&self) -> Vec<Instrument> {
        self.store.instruments()
    }

    /// Auction price right now, from the wall clock.
    ///
    /// Outside IPO_ACTIVE this is the last price the auction reached.
    pub fn current_ipo_price(&self, instrument_id: InstrumentId) -> Result<Decimal> {
        let instrument = self.store.instrument(instrument_id)?;
        Ok(match instrument.status() {
            InstrumentStatus::IpoActive => price_at(&instrument, self.now()),
            InstrumentStatus::Trading | InstrumentStatus::IpoFailed => instrument.current_ipo_price,
        })
    }

    pub fn get_account(&self, account_id: AccountId) -> Result<Account> {
        self.store.account(account_id)
    }

    /// Every position held by `account_id`.
    pub fn portfolio(&self, account_id: AccountId) -> Result<Vec<Holding>> {
        self.store.account(account_id)?;
        Ok(self.store.holdings_of(account_id))
    }

    /// OPEN and PARTIALLY_FILLED orders, oldest first.
    pub fn open_orders(&self, account_id: AccountId) -> Vec<Order> {
        self.store
            .orders_of(account_id)
            .into_iter()
            .filter(|o| !o.status().is_terminal())
            .collect()
    }

    pub fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store.order(order_id)
    }

    /// IPO and matched trades of an instrument, in execution order.
    pub fn trades(&self, instrument_id: InstrumentId) -> Result<Vec<Trade>> {
        self.store.instrument(instrument_id)?;
        Ok(self.store.trades_for(instrument_id))
    }

    pub fn ledger(&self, account_id: AccountId) -> Vec<LedgerEntry> {
        self.store.ledger_of(account_id)
    }

    /// Verify the digests and balance chain of an account's ledger and
    /// compare the result with its recorded balance.
    ///
    /// # Errors
    /// `InvariantViolation` on any break.
    pub fn verify_ledger_chain(&self, account_id: AccountId) -> Result<Decimal> {
        let (account, entries) = self.store.account_with_ledger(account_id)?;
        let balance = verify_chain(&entries)?;
        if balance != account.balance() {
            return Err(BourseError::InvariantViolation {
                reason: format!(
                    "ledger of {account_id} ends at {balance}, account holds {}",
                    account.balance()
                ),
            });
        }
        Ok(balance)
    }
}
