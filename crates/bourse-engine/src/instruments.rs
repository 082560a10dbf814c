//! Instrument submission.

use bourse_ledger::{PostingDetails, debit};
use bourse_types::{
    AccountId, BourseError, Instrument, IpoTerms, LedgerEntryKind, Result, Symbol,
    VestingSchedule,
};
use rust_decimal::Decimal;
use tracing::info;

use crate::Exchange;

impl Exchange {
    /// List a new instrument in IPO_ACTIVE on behalf of `creator`.
    ///
    /// In one transaction: the submission fee is debited, the instrument
    /// is created with its auction window starting now, and the creator
    /// receives the fully locked creator allocation with a vesting
    /// schedule.
    ///
    /// # Errors
    /// - `InvalidSymbol` for a malformed symbol
    /// - `DuplicateSymbol` if the symbol is taken
    /// - `InsufficientFunds` if the creator cannot pay the fee
    pub fn submit_instrument(&self, creator: AccountId, symbol: &str, name: &str) -> Result<Instrument> {
        let symbol = Symbol::parse(symbol)?;
        if self.store.instrument_by_symbol(&symbol).is_ok() {
            return Err(BourseError::DuplicateSymbol(symbol.to_string()));
        }
        let fee = self.config.submission_fee;
        let creator_shares = self.config.ipo.creator_shares;

        let instrument = self.run("submit_instrument", |tx| {
            let now = self.now();
            tx.lock_accounts([creator])?;
            let instrument = Instrument::list(
                symbol.clone(),
                name,
                creator,
                IpoTerms::from(&self.config.ipo),
                creator_shares,
                now,
            );
            let id = tx.create_instrument(instrument);

            if fee > Decimal::ZERO {
                tx.post(creator, |account, head| {
                    debit(
                        account,
                        fee,
                        LedgerEntryKind::SubmissionFee,
                        PostingDetails::new(format!("listing fee for {symbol}")).instrument(id),
                        head,
                        now,
                    )
                })?;
            }

            if creator_shares > 0 {
                tx.holding_mut(creator, id)?
                    .grant_locked(creator_shares, Decimal::ZERO);
                tx.put_vesting(VestingSchedule::new(
                    creator,
                    id,
                    creator_shares,
                    self.config.vesting_checkpoints.clone(),
                    now,
                )?)?;
            }
            Ok(tx.instrument(id)?.clone())
        })?;

        info!(
            instrument = %instrument.id,
            symbol = %instrument.symbol,
            creator = %creator,
            ends_at = %instrument.ipo_ends_at,
            "instrument listed"
        );
        Ok(instrument)
    }
}
