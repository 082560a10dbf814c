//! Invariant auditor.
//!
//! Checks a [`StoreSnapshot`] taken at one commit boundary:
//!
//! ```text
//! ∀ account:    balance ≥ 0, ledger chain intact, chain ends at balance
//! ∀ order:      filled ≤ quantity
//! ∀ instrument: ipo_shares_sold ≤ shares_offered
//!               Σ holdings.quantity == outstanding_shares ≤ total_supply
//! ∀ book entry: backed by a live order with the same remaining quantity
//! ∀ holding:    locked ≥ open SELL remainder + unvested grant
//! ∀ schedule:   unlocked ≤ total_granted
//! ```
//!
//! `quantity == available + locked` holds by construction of
//! [`Holding`](bourse_types::Holding) and is not re-checked.

use std::collections::HashMap;

use bourse_ledger::verify_chain;
use bourse_store::StoreSnapshot;
use bourse_types::{
    AccountId, BourseError, InstrumentId, Order, OrderSide, Result,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::error;

use crate::Exchange;

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub rule: &'static str,
    pub detail: String,
}

impl Violation {
    fn new(rule: &'static str, detail: String) -> Self {
        Self { rule, detail }
    }
}

/// Stateless checker over store snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvariantAuditor;

impl InvariantAuditor {
    /// Every violation found in `snapshot`.
    #[must_use]
    pub fn audit(snapshot: &StoreSnapshot) -> Vec<Violation> {
        let mut found = Vec::new();
        Self::audit_accounts(snapshot, &mut found);
        Self::audit_orders(snapshot, &mut found);
        Self::audit_instruments(snapshot, &mut found);
        Self::audit_locks(snapshot, &mut found);
        for schedule in &snapshot.vesting {
            if schedule.unlocked() > schedule.total_granted {
                found.push(Violation::new(
                    "vesting_bound",
                    format!(
                        "{}/{} unlocked {} of {}",
                        schedule.account_id,
                        schedule.instrument_id,
                        schedule.unlocked(),
                        schedule.total_granted
                    ),
                ));
            }
        }
        found
    }

    /// `Ok` if `snapshot` is clean, else the first violation.
    pub fn check(snapshot: &StoreSnapshot) -> Result<()> {
        match Self::audit(snapshot).into_iter().next() {
            None => Ok(()),
            Some(v) => Err(BourseError::InvariantViolation {
                reason: format!("{}: {}", v.rule, v.detail),
            }),
        }
    }

    fn audit_accounts(snapshot: &StoreSnapshot, found: &mut Vec<Violation>) {
        for account in &snapshot.accounts {
            if account.balance().is_sign_negative() {
                found.push(Violation::new(
                    "non_negative_balance",
                    format!("{} holds {}", account.id, account.balance()),
                ));
            }
            let entries = snapshot.ledger.get(&account.id).map_or(&[][..], Vec::as_slice);
            match verify_chain(entries) {
                Ok(end) if end == account.balance() => {}
                Ok(end) => found.push(Violation::new(
                    "ledger_balance",
                    format!("{} ledger ends at {end}, account holds {}", account.id, account.balance()),
                )),
                Err(err) => found.push(Violation::new("ledger_chain", format!("{}: {err}", account.id))),
            }
        }
    }

    fn audit_orders(snapshot: &StoreSnapshot, found: &mut Vec<Violation>) {
        let orders: HashMap<_, &Order> = snapshot.orders.iter().map(|o| (o.id, o)).collect();
        for order in &snapshot.orders {
            if order.filled_quantity() > order.quantity {
                found.push(Violation::new(
                    "order_fill",
                    format!("{} filled {} of {}", order.id, order.filled_quantity(), order.quantity),
                ));
            }
        }
        for row in &snapshot.instruments {
            for side in [OrderSide::Buy, OrderSide::Sell] {
                for entry in row.book.entries(side) {
                    match orders.get(&entry.order_id) {
                        Some(order)
                            if !order.status().is_terminal()
                                && order.remaining_quantity() == entry.remaining => {}
                        _ => found.push(Violation::new(
                            "book_consistency",
                            format!("book entry {} has no matching live order", entry.order_id),
                        )),
                    }
                }
            }
        }
    }

    fn audit_instruments(snapshot: &StoreSnapshot, found: &mut Vec<Violation>) {
        let mut held: HashMap<InstrumentId, u64> = HashMap::new();
        for holding in &snapshot.holdings {
            *held.entry(holding.instrument_id).or_default() += holding.quantity();
        }
        for row in &snapshot.instruments {
            let instrument = &row.instrument;
            if instrument.ipo_shares_sold() > instrument.ipo.shares_offered {
                found.push(Violation::new(
                    "ipo_oversold",
                    format!(
                        "{} sold {} of {}",
                        instrument.id,
                        instrument.ipo_shares_sold(),
                        instrument.ipo.shares_offered
                    ),
                ));
            }
            let total = held.get(&instrument.id).copied().unwrap_or(0);
            if total != instrument.outstanding_shares {
                found.push(Violation::new(
                    "share_conservation",
                    format!(
                        "{} holdings sum to {total}, outstanding is {}",
                        instrument.id, instrument.outstanding_shares
                    ),
                ));
            }
            if instrument.outstanding_shares > instrument.total_supply {
                found.push(Violation::new(
                    "supply_bound",
                    format!(
                        "{} outstanding {} exceeds supply {}",
                        instrument.id, instrument.outstanding_shares, instrument.total_supply
                    ),
                ));
            }
        }
    }

    fn audit_locks(snapshot: &StoreSnapshot, found: &mut Vec<Violation>) {
        let mut required: HashMap<(AccountId, InstrumentId), u64> = HashMap::new();
        for order in &snapshot.orders {
            if order.side == OrderSide::Sell && !order.status().is_terminal() {
                *required.entry((order.account_id, order.instrument_id)).or_default() +=
                    order.remaining_quantity();
            }
        }
        for schedule in &snapshot.vesting {
            *required.entry((schedule.account_id, schedule.instrument_id)).or_default() +=
                schedule.total_granted.saturating_sub(schedule.unlocked());
        }
        let locked: HashMap<(AccountId, InstrumentId), u64> = snapshot
            .holdings
            .iter()
            .map(|h| ((h.account_id, h.instrument_id), h.locked()))
            .collect();
        for ((account, instrument), needed) in required {
            let have = locked.get(&(account, instrument)).copied().unwrap_or(0);
            if have < needed {
                found.push(Violation::new(
                    "locked_cover",
                    format!("{account}/{instrument} locks {have}, needs {needed}"),
                ));
            }
        }
    }
}

impl Exchange {
    /// Audit the whole store at one commit boundary.
    ///
    /// # Errors
    /// `InvariantViolation` naming the first broken invariant; all of them
    /// are logged.
    pub fn audit(&self) -> Result<()> {
        let snapshot = self.store.snapshot();
        let violations = InvariantAuditor::audit(&snapshot);
        for v in &violations {
            error!(rule = v.rule, detail = %v.detail, "invariant violated");
        }
        InvariantAuditor::check(&snapshot)
    }

    /// Total balance across every account.
    pub fn total_balance(&self) -> Decimal {
        self.store.snapshot().accounts.iter().map(|a| a.balance()).sum()
    }
}
