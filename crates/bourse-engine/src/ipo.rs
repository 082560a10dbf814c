//! Dutch-auction IPO: purchases, price refresh, expiry and refunds.
//!
//! ```text
//!              sold out / threshold met at expiry
//! IPO_ACTIVE ──────────────────────────────────────▶ TRADING
//!     │
//!     └── threshold missed at expiry ──────────────▶ IPO_FAILED ──▶ refunds
//! ```
//!
//! Purchases always price from the wall clock, never from the cached
//! `current_ipo_price`; the pricing tick only refreshes that cache for
//! display.
//!
//! Refunds run one transaction per IPO trade. Each writes an
//! `IpoRefund` ledger entry referencing the trade, which is what makes a
//! refund pass idempotent: trades already referenced are skipped, and a
//! trade whose refund failed is picked up again on the next expiry tick.

use bourse_ledger::{PostingDetails, credit, debit, fill_costs};
use bourse_matchcore::price_at;
use bourse_types::{
    AccountId, BourseError, InstrumentId, InstrumentStatus, LedgerEntryKind, MarketEvent,
    Result, Trade,
};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::Exchange;
use crate::matching::withdraw_order;
use crate::scheduler::TickReport;

impl Exchange {
    /// Buy `quantity` shares from the auction pool at the current price.
    ///
    /// The buyer pays `notional + fee`. A purchase that sells the last
    /// offered share moves the instrument to TRADING immediately.
    ///
    /// # Errors
    /// - `AuctionNotActive` unless the instrument is IPO_ACTIVE
    /// - `AuctionEnded` once the window has closed
    /// - `QuantityExceedsAvailable` if fewer shares remain in the pool
    /// - `InsufficientFunds` if the buyer cannot pay
    pub fn buy_ipo(&self, buyer: AccountId, instrument_id: InstrumentId, quantity: u64) -> Result<Trade> {
        if quantity == 0 {
            return Err(BourseError::InvalidOrderParameters {
                reason: "quantity must be positive".to_string(),
            });
        }
        let rate = self.config.fee_rate;

        let trade = self.run("buy_ipo", |tx| {
            let now = self.now();
            tx.lock_instrument(instrument_id)?;
            tx.lock_accounts([buyer])?;

            let instrument = tx.instrument(instrument_id)?;
            if instrument.status() != InstrumentStatus::IpoActive {
                return Err(BourseError::AuctionNotActive {
                    instrument: instrument_id,
                    status: instrument.status(),
                });
            }
            if instrument.is_auction_expired(now) {
                return Err(BourseError::AuctionEnded {
                    instrument: instrument_id,
                    ended_at: instrument.ipo_ends_at,
                });
            }
            let available = instrument.ipo_shares_remaining();
            if quantity > available {
                return Err(BourseError::QuantityExceedsAvailable {
                    requested: quantity,
                    available,
                });
            }
            let price = price_at(instrument, now);
            let symbol = instrument.symbol.clone();

            let costs = fill_costs(quantity, price, rate);
            let trade = Trade::ipo(
                instrument_id,
                buyer,
                quantity,
                price,
                costs.notional,
                costs.buyer_fee,
                now,
            );
            tx.post(buyer, |account, head| {
                debit(
                    account,
                    costs.buyer_cost(),
                    LedgerEntryKind::IpoPurchase,
                    PostingDetails::new(format!("IPO purchase of {quantity} {symbol}"))
                        .instrument(instrument_id)
                        .shares(quantity, price)
                        .fee(costs.buyer_fee)
                        .reference(trade.id),
                    head,
                    now,
                )
            })?;

            let instrument = tx.instrument_mut(instrument_id)?;
            instrument.record_ipo_sale(quantity)?;
            instrument.current_ipo_price = price;
            let sold_out = instrument.is_sold_out();
            if sold_out {
                instrument.transition_to(InstrumentStatus::Trading)?;
            }

            tx.holding_mut(buyer, instrument_id)?.acquire(quantity, price);
            tx.record_trade(trade.clone());
            tx.emit(MarketEvent::TradeExecuted {
                trade: trade.clone(),
            });
            if sold_out {
                tx.emit(MarketEvent::InstrumentStatusChanged {
                    instrument_id,
                    from: InstrumentStatus::IpoActive,
                    to: InstrumentStatus::Trading,
                });
            }
            Ok(trade)
        })?;

        info!(
            instrument = %instrument_id,
            buyer = %buyer,
            quantity,
            price = %trade.price,
            cost = %trade.buyer_cost(),
            "IPO purchase"
        );
        Ok(trade)
    }

    /// Refresh the cached auction price of every IPO_ACTIVE instrument.
    pub fn tick_ipo_pricing(&self) -> TickReport {
        let mut report = TickReport::default();
        for instrument in self.store.instruments() {
            if instrument.status() != InstrumentStatus::IpoActive {
                continue;
            }
            let result = self.refresh_ipo_price(instrument.id);
            report.record("ipo_pricing", instrument.id, result);
        }
        report
    }

    fn refresh_ipo_price(&self, instrument_id: InstrumentId) -> Result<bool> {
        self.run("tick_ipo_pricing", |tx| {
            let now = self.now();
            tx.lock_instrument(instrument_id)?;
            let instrument = tx.instrument_mut(instrument_id)?;
            if instrument.status() != InstrumentStatus::IpoActive {
                return Ok(false);
            }
            let price = price_at(instrument, now);
            if price == instrument.current_ipo_price {
                return Ok(false);
            }
            instrument.current_ipo_price = price;
            tx.emit(MarketEvent::IpoPriceUpdated {
                instrument_id,
                price,
                at: now,
            });
            Ok(true)
        })
    }

    /// Resolve expired auctions and refund failed ones.
    ///
    /// Instruments already in IPO_FAILED with unrefunded trades are
    /// refunded again.
    pub fn tick_ipo_expiry(&self) -> TickReport {
        let now = self.now();
        let mut report = TickReport::default();
        for instrument in self.store.instruments() {
            let id = instrument.id;
            match instrument.status() {
                InstrumentStatus::IpoActive if instrument.is_auction_expired(now) => {
                    let result = self.resolve_auction(id).and_then(|resolved| {
                        if resolved == Some(InstrumentStatus::IpoFailed) {
                            self.refund_failed_ipo(id)?;
                        }
                        Ok(resolved.is_some())
                    });
                    report.record("ipo_expiry", id, result);
                }
                InstrumentStatus::IpoFailed if self.has_pending_refunds(id) => {
                    let result = self.refund_failed_ipo(id).map(|refunded| refunded > 0);
                    report.record("ipo_expiry", id, result);
                }
                _ => {}
            }
        }
        report
    }

    /// Move an expired IPO_ACTIVE instrument to its terminal status.
    ///
    /// `None` if there was nothing to resolve (already resolved, or the
    /// window has not closed).
    fn resolve_auction(&self, instrument_id: InstrumentId) -> Result<Option<InstrumentStatus>> {
        self.run("resolve_auction", |tx| {
            let now = self.now();
            tx.lock_instrument(instrument_id)?;
            let instrument = tx.instrument_mut(instrument_id)?;
            if instrument.status() != InstrumentStatus::IpoActive || !instrument.is_auction_expired(now) {
                return Ok(None);
            }
            let target = if instrument.reached_success_threshold() {
                InstrumentStatus::Trading
            } else {
                InstrumentStatus::IpoFailed
            };
            instrument.transition_to(target)?;
            info!(
                instrument = %instrument_id,
                sold = instrument.ipo_shares_sold(),
                required = instrument.success_quantity(),
                status = %target,
                "auction resolved"
            );
            tx.emit(MarketEvent::InstrumentStatusChanged {
                instrument_id,
                from: InstrumentStatus::IpoActive,
                to: target,
            });
            Ok(Some(target))
        })
    }

    fn unrefunded_trades(&self, instrument_id: InstrumentId) -> Vec<Trade> {
        self.store
            .trades_for(instrument_id)
            .into_iter()
            .filter(|t| t.is_ipo && !self.store.is_refunded(t.id))
            .collect()
    }

    fn has_pending_refunds(&self, instrument_id: InstrumentId) -> bool {
        !self.unrefunded_trades(instrument_id).is_empty()
    }

    /// Refund every IPO trade of a failed instrument not refunded yet.
    ///
    /// Trades are refunded one transaction each; a failing refund is
    /// logged and the rest still run. Returns the number refunded.
    ///
    /// # Errors
    /// The last refund error, after every trade has been attempted.
    pub fn refund_failed_ipo(&self, instrument_id: InstrumentId) -> Result<usize> {
        let mut refunded = 0;
        let mut failure = None;
        for trade in self.unrefunded_trades(instrument_id) {
            match self.refund_trade(&trade) {
                Ok(true) => refunded += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(
                        instrument = %instrument_id,
                        trade = %trade.id,
                        buyer = %trade.buyer,
                        error = %err,
                        "IPO refund failed, will retry next tick"
                    );
                    failure = Some(err);
                }
            }
        }
        if refunded > 0 {
            info!(instrument = %instrument_id, refunded, "IPO refunds processed");
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(refunded),
        }
    }

    /// Reverse one IPO purchase: the shares return to the pool and the
    /// buyer gets `total_value + fee` back.
    ///
    /// The buyer's live orders in the instrument are cancelled first so
    /// that shares reserved by a SELL come back too. Shares already sold
    /// on the failed book cannot be returned; the refund then covers only
    /// the returned shares at the purchase price, with the fee prorated.
    fn refund_trade(&self, trade: &Trade) -> Result<bool> {
        let instrument_id = trade.instrument_id;
        let buyer = trade.buyer;
        self.run("ipo_refund", |tx| {
            let now = self.now();
            tx.lock_instrument(instrument_id)?;
            tx.lock_accounts([buyer])?;
            if tx.is_refunded(trade.id) {
                return Ok(false);
            }

            for order in tx.open_orders(buyer, instrument_id)? {
                withdraw_order(tx, &order, now)?;
            }

            let holding = tx.holding_mut(buyer, instrument_id)?;
            let returned = trade.quantity.min(holding.available());
            holding.surrender(returned)?;
            tx.instrument_mut(instrument_id)?
                .retire_refunded_shares(returned)?;

            let amount = if returned == trade.quantity {
                trade.buyer_cost()
            } else {
                warn!(
                    trade = %trade.id,
                    buyer = %buyer,
                    bought = trade.quantity,
                    returned,
                    "refunded buyer no longer holds every purchased share"
                );
                let share = Decimal::from(returned);
                trade.price * share + trade.buyer_fee * share / Decimal::from(trade.quantity)
            };
            tx.post(buyer, |account, head| {
                credit(
                    account,
                    amount,
                    LedgerEntryKind::IpoRefund,
                    PostingDetails::new("refund of failed IPO purchase")
                        .instrument(instrument_id)
                        .shares(returned, trade.price)
                        .fee(amount - trade.price * Decimal::from(returned))
                        .reference(trade.id),
                    head,
                    now,
                )
            })?;
            Ok(true)
        })
    }
}
