//! Order placement, matching and cancellation.
//!
//! A placed order is admitted and swept against the opposite side of its
//! book right away. How the pass commits depends on
//! [`MatchAtomicity`]:
//!
//! - `SingleTransaction`: the instrument and every account the sweep can
//!   touch are locked up front; admission and all fills commit together.
//! - `ChainedTransactions`: admission commits first, then each fill in
//!   its own transaction, then a closing transaction rests or cancels the
//!   remainder. A failure mid-sweep keeps the fills already committed.
//!
//! Either way the pass ends the same: a LIMIT remainder rests in the
//! book, a MARKET remainder is cancelled and any shares it still had
//! locked go back to available.

use std::collections::HashSet;

use bourse_ledger::{PostingDetails, credit, debit, fill_costs};
use bourse_matchcore::{BookEntry, FillOutcome, best_counterparty, crossing_accounts, match_incoming};
use bourse_store::Tx;
use bourse_types::{
    AccountId, BourseError, LedgerEntryKind, MarketEvent, MatchAtomicity, Order, OrderId,
    OrderRequest, OrderSide, Result, Trade, TradeId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::Exchange;

/// What one `place_order` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    /// The order as it stands after the pass.
    pub order: Order,
    pub trades: Vec<Trade>,
    pub filled_quantity: u64,
    /// MARKET remainder cancelled at the end of the pass; 0 for LIMIT.
    pub cancelled_quantity: u64,
}

enum ChainStep {
    Filled(Trade),
    Skipped(OrderId),
    Done,
}

impl Exchange {
    /// Admit an order and match it immediately.
    ///
    /// # Errors
    /// - `InvalidOrderParameters` for a bad quantity or limit price
    /// - `InstrumentNotTradable` unless TRADING or IPO_FAILED
    /// - `InsufficientShares` / `InsufficientFunds` at admission
    pub fn place_order(&self, account: AccountId, request: &OrderRequest) -> Result<PlacedOrder> {
        self.validator.check_quantity(request.quantity)?;
        let placed = match self.config.match_atomicity {
            MatchAtomicity::SingleTransaction => self.place_single(account, request)?,
            MatchAtomicity::ChainedTransactions => self.place_chained(account, request)?,
        };
        info!(
            order = %placed.order.id,
            account = %account,
            instrument = %request.instrument_id,
            side = ?request.side,
            kind = ?request.order_type,
            filled = placed.filled_quantity,
            cancelled = placed.cancelled_quantity,
            status = %placed.order.status(),
            "order placed"
        );
        Ok(placed)
    }

    fn place_single(&self, account: AccountId, request: &OrderRequest) -> Result<PlacedOrder> {
        let instrument_id = request.instrument_id;
        let stp = self.config.self_trade_prevention;
        self.run("place_order", |tx| {
            let now = self.now();
            tx.lock_instrument(instrument_id)?;
            let order = Order::new(account, request, tx.next_sequence(), now)?;
            let mut accounts = crossing_accounts(tx.book(instrument_id)?, &order);
            accounts.push(account);
            tx.lock_accounts(accounts)?;
            self.admit(tx, &order)?;

            let mut book = tx.book(instrument_id)?.clone();
            let mut trades = Vec::new();
            let report = match_incoming(&mut book, &order, stp, |resting, quantity, price| {
                Ok(match self.execute_fill(tx, &order, resting, quantity, price, now)? {
                    Some(trade) => {
                        trades.push(trade);
                        FillOutcome::Filled
                    }
                    None => FillOutcome::Skip,
                })
            })?;
            *tx.market_mut(instrument_id)?.1 = book;

            let cancelled_quantity = self.finish_pass(tx, order.id, now)?;
            Ok(PlacedOrder {
                order: tx.order(order.id)?,
                trades,
                filled_quantity: report.filled_quantity(),
                cancelled_quantity,
            })
        })
    }

    fn place_chained(&self, account: AccountId, request: &OrderRequest) -> Result<PlacedOrder> {
        let instrument_id = request.instrument_id;
        let stp = self.config.self_trade_prevention;

        let order = self.run("place_order.admit", |tx| {
            let now = self.now();
            tx.lock_instrument(instrument_id)?;
            let order = Order::new(account, request, tx.next_sequence(), now)?;
            tx.lock_accounts([account])?;
            self.admit(tx, &order)?;
            Ok(order)
        })?;

        let mut trades = Vec::new();
        let mut skipped: HashSet<OrderId> = HashSet::new();
        let sweep = loop {
            let step = self.run("place_order.fill", |tx| {
                let now = self.now();
                tx.lock_instrument(instrument_id)?;
                let current = tx.order(order.id)?;
                if current.status().is_terminal() || current.remaining_quantity() == 0 {
                    return Ok(ChainStep::Done);
                }
                let Some(resting) = best_counterparty(tx.book(instrument_id)?, &current, stp, &skipped)
                else {
                    return Ok(ChainStep::Done);
                };
                tx.lock_accounts([current.account_id, resting.account_id])?;
                let quantity = current.remaining_quantity().min(resting.remaining);
                match self.execute_fill(tx, &current, &resting, quantity, resting.price, now)? {
                    Some(trade) => {
                        tx.market_mut(instrument_id)?
                            .1
                            .reduce(&resting.order_id, quantity)?;
                        Ok(ChainStep::Filled(trade))
                    }
                    None => Ok(ChainStep::Skipped(resting.order_id)),
                }
            });
            match step {
                Ok(ChainStep::Filled(trade)) => trades.push(trade),
                Ok(ChainStep::Skipped(id)) => {
                    skipped.insert(id);
                }
                Ok(ChainStep::Done) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        let cancelled_quantity = self.run("place_order.finish", |tx| {
            let now = self.now();
            tx.lock_instrument(instrument_id)?;
            tx.lock_accounts([account])?;
            self.finish_pass(tx, order.id, now)
        })?;
        if let Err(err) = sweep {
            warn!(
                order = %order.id,
                fills = trades.len(),
                error = %err,
                "match pass aborted, earlier fills stay committed"
            );
            return Err(err);
        }

        let order = self.store.order(order.id)?;
        Ok(PlacedOrder {
            filled_quantity: order.filled_quantity(),
            order,
            trades,
            cancelled_quantity,
        })
    }

    /// Admission checks, share lock for a SELL, and the order record.
    fn admit(&self, tx: &mut Tx<'_>, order: &Order) -> Result<()> {
        let holding = tx.holding(order.account_id, order.instrument_id)?;
        self.validator.validate(
            order,
            tx.instrument(order.instrument_id)?,
            tx.account(order.account_id)?,
            holding.as_ref(),
            tx.book(order.instrument_id)?,
        )?;
        if order.side == OrderSide::Sell {
            tx.holding_mut(order.account_id, order.instrument_id)?
                .lock(order.quantity)?;
        }
        tx.insert_order(order.clone())
    }

    /// Settle one pairing at `price` for `quantity` shares.
    ///
    /// `None` if the resting side is a buyer who can no longer pay; the
    /// caller moves on to the next resting order.
    fn execute_fill(
        &self,
        tx: &mut Tx<'_>,
        incoming: &Order,
        resting: &BookEntry,
        quantity: u64,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Option<Trade>> {
        let instrument_id = incoming.instrument_id;
        let costs = fill_costs(quantity, price, self.config.fee_rate);
        let (buyer, seller, buy_order, sell_order) = match incoming.side {
            OrderSide::Buy => (incoming.account_id, resting.account_id, incoming.id, resting.order_id),
            OrderSide::Sell => (resting.account_id, incoming.account_id, resting.order_id, incoming.id),
        };

        let available = tx.account(buyer)?.balance();
        if available < costs.buyer_cost() {
            if incoming.side == OrderSide::Sell {
                warn!(
                    resting = %resting.order_id,
                    buyer = %buyer,
                    needed = %costs.buyer_cost(),
                    %available,
                    "resting buyer cannot pay, skipping"
                );
                return Ok(None);
            }
            return Err(BourseError::InsufficientFunds {
                needed: costs.buyer_cost(),
                available,
            });
        }

        let trade = Trade {
            id: TradeId::new(),
            instrument_id,
            buyer,
            seller: Some(seller),
            quantity,
            price,
            total_value: costs.notional,
            buyer_fee: costs.buyer_fee,
            seller_fee: costs.seller_fee,
            is_ipo: false,
            buy_order_id: Some(buy_order),
            sell_order_id: Some(sell_order),
            executed_at: now,
        };
        let symbol = tx.instrument(instrument_id)?.symbol.clone();

        tx.post(buyer, |account, head| {
            debit(
                account,
                costs.buyer_cost(),
                LedgerEntryKind::TradeBuy,
                PostingDetails::new(format!("bought {quantity} {symbol} @ {price}"))
                    .instrument(instrument_id)
                    .shares(quantity, price)
                    .fee(costs.buyer_fee)
                    .reference(trade.id),
                head,
                now,
            )
        })?;
        tx.post(seller, |account, head| {
            credit(
                account,
                costs.seller_proceeds(),
                LedgerEntryKind::TradeSell,
                PostingDetails::new(format!("sold {quantity} {symbol} @ {price}"))
                    .instrument(instrument_id)
                    .shares(quantity, price)
                    .fee(costs.seller_fee)
                    .reference(trade.id),
                head,
                now,
            )
        })?;

        tx.holding_mut(seller, instrument_id)?.release_locked(quantity)?;
        tx.holding_mut(buyer, instrument_id)?.acquire(quantity, price);
        tx.order_mut(resting.order_id)?.apply_fill(quantity, now)?;
        tx.order_mut(incoming.id)?.apply_fill(quantity, now)?;
        tx.instrument_mut(instrument_id)?.record_trade(price);

        tx.record_trade(trade.clone());
        tx.emit(MarketEvent::TradeExecuted {
            trade: trade.clone(),
        });
        Ok(Some(trade))
    }

    /// Rest a LIMIT remainder or cancel a MARKET one.
    ///
    /// Returns the cancelled quantity.
    fn finish_pass(&self, tx: &mut Tx<'_>, order_id: OrderId, now: DateTime<Utc>) -> Result<u64> {
        let order = tx.order(order_id)?;
        if order.status().is_terminal() || order.remaining_quantity() == 0 {
            return Ok(0);
        }
        if !order.is_market() {
            tx.market_mut(order.instrument_id)?.1.rest(&order)?;
            return Ok(0);
        }

        let cancelled = tx.order_mut(order_id)?.cancel(now)?;
        if order.side == OrderSide::Sell {
            tx.holding_mut(order.account_id, order.instrument_id)?
                .unlock(cancelled)?;
        }
        tx.emit(MarketEvent::OrderCancelled {
            order_id,
            instrument_id: order.instrument_id,
            cancelled_quantity: cancelled,
        });
        info!(
            order = %order_id,
            filled = order.filled_quantity(),
            cancelled,
            "market order remainder cancelled"
        );
        Ok(cancelled)
    }

    /// Cancel an OPEN or PARTIALLY_FILLED order owned by `account`.
    ///
    /// A SELL's remaining locked shares go back to available.
    ///
    /// # Errors
    /// - `OrderNotFound`
    /// - `Unauthorized` if `account` does not own the order
    /// - `OrderNotCancellable` if the order is FILLED or CANCELLED
    pub fn cancel_order(&self, account: AccountId, order_id: OrderId) -> Result<Order> {
        let instrument_id = self.store.order(order_id)?.instrument_id;
        let order = self.run("cancel_order", |tx| {
            let now = self.now();
            tx.lock_instrument(instrument_id)?;
            let order = tx.order(order_id)?;
            if order.account_id != account {
                return Err(BourseError::Unauthorized { account, order_id });
            }
            tx.lock_accounts([account])?;
            withdraw_order(tx, &order, now)?;
            tx.order(order_id)
        })?;
        info!(order = %order_id, account = %account, "order cancelled");
        Ok(order)
    }
}

/// Cancel a live order inside `tx`: off the book, and a SELL's
/// remaining shares unlocked. Needs the instrument and owner locks.
///
/// Returns the cancelled quantity.
pub(crate) fn withdraw_order(tx: &mut Tx<'_>, order: &Order, now: DateTime<Utc>) -> Result<u64> {
    let (order_id, instrument_id) = (order.id, order.instrument_id);
    let cancelled = tx.order_mut(order_id)?.cancel(now)?;
    let book = tx.market_mut(instrument_id)?.1;
    if book.contains(&order_id) {
        book.remove(&order_id)?;
    }
    if order.side == OrderSide::Sell && cancelled > 0 {
        tx.holding_mut(order.account_id, instrument_id)?.unlock(cancelled)?;
    }
    tx.emit(MarketEvent::OrderCancelled {
        order_id,
        instrument_id,
        cancelled_quantity: cancelled,
    });
    Ok(cancelled)
}
