//! Transactions.
//!
//! A [`Tx`] owns the row locks it acquired and a staged copy of every
//! value it touched. Nothing is visible to other transactions or to
//! snapshot readers until [`Tx::commit`]; dropping a `Tx` without
//! committing discards the staged writes. Either way the row locks are
//! released when the `Tx` is dropped.
//!
//! Lock order:
//!
//! 1. instruments, ascending id
//! 2. accounts, ascending id
//!
//! A request that would break this order fails with
//! `LockOrderViolation`; a lock not granted within the wait limit fails
//! with `LockTimeout` (retryable).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bourse_matchcore::OrderBook;
use bourse_types::{
    Account, AccountId, BourseError, Holding, Instrument, InstrumentId, LedgerEntry,
    LedgerEntryKind, MarketEvent, Order, OrderId, Result, Symbol, Trade, TradeId,
    VestingSchedule,
};
use tracing::debug;

use crate::memory::{InstrumentRow, MemoryStore};
use crate::row::{Row, lock, write};

#[derive(Debug)]
struct Held<T> {
    row: Arc<Row<T>>,
    staged: T,
    /// Created by this transaction; not yet in the store's map.
    fresh: bool,
}

/// One atomic unit of work against a [`MemoryStore`].
#[derive(Debug)]
pub struct Tx<'s> {
    store: &'s MemoryStore,
    instruments: BTreeMap<InstrumentId, Held<InstrumentRow>>,
    accounts: BTreeMap<AccountId, Held<Account>>,
    holdings: HashMap<(AccountId, InstrumentId), Holding>,
    orders: HashMap<OrderId, Order>,
    vesting: HashMap<(AccountId, InstrumentId), VestingSchedule>,
    trades: Vec<Trade>,
    entries: Vec<LedgerEntry>,
    heads: HashMap<AccountId, [u8; 32]>,
    symbols: Vec<(Symbol, InstrumentId)>,
    events: Vec<MarketEvent>,
}

impl<'s> Tx<'s> {
    pub(crate) fn new(store: &'s MemoryStore) -> Self {
        Self {
            store,
            instruments: BTreeMap::new(),
            accounts: BTreeMap::new(),
            holdings: HashMap::new(),
            orders: HashMap::new(),
            vesting: HashMap::new(),
            trades: Vec::new(),
            entries: Vec::new(),
            heads: HashMap::new(),
            symbols: Vec::new(),
            events: Vec::new(),
        }
    }

    // =================================================================
    // Locking
    // =================================================================

    /// Lock one instrument row.
    ///
    /// Must precede every account lock, and ids must ascend.
    pub fn lock_instrument(&mut self, id: InstrumentId) -> Result<()> {
        if self.instruments.contains_key(&id) {
            return Ok(());
        }
        if self.accounts.values().any(|held| !held.fresh) {
            return Err(BourseError::LockOrderViolation {
                reason: format!("instrument {id} requested after account locks"),
            });
        }
        if let Some((last, _)) = self.instruments.iter().rev().find(|(_, held)| !held.fresh) {
            if id < *last {
                return Err(BourseError::LockOrderViolation {
                    reason: format!("instrument {id} requested after {last}"),
                });
            }
        }
        let row = self.store.instrument_row(id)?;
        if !row.acquire(self.store.lock_wait()) {
            return Err(BourseError::LockTimeout {
                resource: format!("instrument {id}"),
            });
        }
        let staged = row.get();
        self.instruments.insert(
            id,
            Held {
                row,
                staged,
                fresh: false,
            },
        );
        Ok(())
    }

    /// Lock accounts in ascending order.
    ///
    /// Accounts already held are skipped; every new id must sort after
    /// the accounts already held.
    pub fn lock_accounts(&mut self, ids: impl IntoIterator<Item = AccountId>) -> Result<()> {
        let mut ids: Vec<AccountId> = ids
            .into_iter()
            .filter(|id| !self.accounts.contains_key(id))
            .collect();
        ids.sort();
        ids.dedup();
        let Some(first) = ids.first() else {
            return Ok(());
        };
        if let Some((last, _)) = self.accounts.iter().rev().find(|(_, held)| !held.fresh) {
            if first < last {
                return Err(BourseError::LockOrderViolation {
                    reason: format!("account {first} requested after {last}"),
                });
            }
        }
        for id in ids {
            let row = self.store.account_row(id)?;
            if !row.acquire(self.store.lock_wait()) {
                return Err(BourseError::LockTimeout {
                    resource: format!("account {id}"),
                });
            }
            let staged = row.get();
            self.accounts.insert(
                id,
                Held {
                    row,
                    staged,
                    fresh: false,
                },
            );
        }
        Ok(())
    }

    pub fn holds_instrument(&self, id: InstrumentId) -> bool {
        self.instruments.contains_key(&id)
    }

    pub fn holds_account(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id)
    }

    fn require_instrument(&self, id: InstrumentId) -> Result<()> {
        if self.holds_instrument(id) {
            Ok(())
        } else {
            Err(BourseError::RowNotLocked {
                resource: format!("instrument {id}"),
            })
        }
    }

    fn require_account(&self, id: AccountId) -> Result<()> {
        if self.holds_account(id) {
            Ok(())
        } else {
            Err(BourseError::RowNotLocked {
                resource: format!("account {id}"),
            })
        }
    }

    // =================================================================
    // Locked rows
    // =================================================================

    pub fn instrument(&self, id: InstrumentId) -> Result<&Instrument> {
        self.instruments
            .get(&id)
            .map(|held| &held.staged.instrument)
            .ok_or_else(|| BourseError::RowNotLocked {
                resource: format!("instrument {id}"),
            })
    }

    pub fn instrument_mut(&mut self, id: InstrumentId) -> Result<&mut Instrument> {
        Ok(self.market_mut(id)?.0)
    }

    pub fn book(&self, id: InstrumentId) -> Result<&OrderBook> {
        self.instruments
            .get(&id)
            .map(|held| &held.staged.book)
            .ok_or_else(|| BourseError::RowNotLocked {
                resource: format!("instrument {id}"),
            })
    }

    /// Instrument and book of one locked row, both mutable.
    pub fn market_mut(&mut self, id: InstrumentId) -> Result<(&mut Instrument, &mut OrderBook)> {
        self.instruments
            .get_mut(&id)
            .map(|held| (&mut held.staged.instrument, &mut held.staged.book))
            .ok_or_else(|| BourseError::RowNotLocked {
                resource: format!("instrument {id}"),
            })
    }

    pub fn account(&self, id: AccountId) -> Result<&Account> {
        self.accounts
            .get(&id)
            .map(|held| &held.staged)
            .ok_or_else(|| BourseError::RowNotLocked {
                resource: format!("account {id}"),
            })
    }

    pub fn account_mut(&mut self, id: AccountId) -> Result<&mut Account> {
        self.accounts
            .get_mut(&id)
            .map(|held| &mut held.staged)
            .ok_or_else(|| BourseError::RowNotLocked {
                resource: format!("account {id}"),
            })
    }

    /// Apply a ledger posting to a locked account.
    ///
    /// `post` receives the account and the digest of its latest entry
    /// and returns the new entry, which is staged and becomes the new
    /// chain head.
    pub fn post<F>(&mut self, account_id: AccountId, post: F) -> Result<LedgerEntry>
    where
        F: FnOnce(&mut Account, [u8; 32]) -> Result<LedgerEntry>,
    {
        let head = match self.heads.get(&account_id) {
            Some(head) => *head,
            None => self.store.ledger_head(account_id),
        };
        let account = self.account_mut(account_id)?;
        let entry = post(account, head)?;
        self.heads.insert(account_id, entry.digest);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    // =================================================================
    // Rows covered by instrument / account locks
    // =================================================================

    /// Position of `account` in `instrument`, if any. Needs the account lock.
    pub fn holding(&self, account: AccountId, instrument: InstrumentId) -> Result<Option<Holding>> {
        self.require_account(account)?;
        if let Some(staged) = self.holdings.get(&(account, instrument)) {
            return Ok(Some(staged.clone()));
        }
        Ok(lock(&self.store.holdings).get(&(account, instrument)).cloned())
    }

    /// Mutable position, created empty if absent. Needs the account lock.
    pub fn holding_mut(&mut self, account: AccountId, instrument: InstrumentId) -> Result<&mut Holding> {
        self.require_account(account)?;
        let key = (account, instrument);
        if !self.holdings.contains_key(&key) {
            let stored = lock(&self.store.holdings)
                .get(&key)
                .cloned()
                .unwrap_or_else(|| Holding::empty(account, instrument));
            self.holdings.insert(key, stored);
        }
        self.holdings
            .get_mut(&key)
            .ok_or_else(|| BourseError::Internal(format!("holding {account}/{instrument} vanished")))
    }

    /// An order of a locked instrument.
    pub fn order(&self, id: OrderId) -> Result<Order> {
        let order = match self.orders.get(&id) {
            Some(order) => order.clone(),
            None => lock(&self.store.orders)
                .get(&id)
                .cloned()
                .ok_or(BourseError::OrderNotFound(id))?,
        };
        self.require_instrument(order.instrument_id)?;
        Ok(order)
    }

    pub fn order_mut(&mut self, id: OrderId) -> Result<&mut Order> {
        if !self.orders.contains_key(&id) {
            let order = self.order(id)?;
            self.orders.insert(id, order);
        }
        let order = self.orders.get_mut(&id).ok_or(BourseError::OrderNotFound(id))?;
        Ok(order)
    }

    /// Live orders of `account` in `instrument`, oldest first.
    ///
    /// Needs both the instrument and the account lock.
    pub fn open_orders(&self, account: AccountId, instrument: InstrumentId) -> Result<Vec<Order>> {
        self.require_instrument(instrument)?;
        self.require_account(account)?;
        let mut merged: HashMap<OrderId, Order> = lock(&self.store.orders)
            .values()
            .filter(|o| o.account_id == account && o.instrument_id == instrument)
            .map(|o| (o.id, o.clone()))
            .collect();
        for staged in self
            .orders
            .values()
            .filter(|o| o.account_id == account && o.instrument_id == instrument)
        {
            merged.insert(staged.id, staged.clone());
        }
        let mut open: Vec<Order> = merged
            .into_values()
            .filter(|o| !o.status().is_terminal())
            .collect();
        open.sort_by_key(|o| o.sequence);
        Ok(open)
    }

    /// Stage a new order. Needs its instrument lock.
    pub fn insert_order(&mut self, order: Order) -> Result<()> {
        self.require_instrument(order.instrument_id)?;
        self.orders.insert(order.id, order);
        Ok(())
    }

    /// Vesting schedule of `(account, instrument)`. Needs the instrument lock.
    pub fn vesting(&self, account: AccountId, instrument: InstrumentId) -> Result<Option<VestingSchedule>> {
        self.require_instrument(instrument)?;
        if let Some(staged) = self.vesting.get(&(account, instrument)) {
            return Ok(Some(staged.clone()));
        }
        Ok(lock(&self.store.vesting).get(&(account, instrument)).cloned())
    }

    pub fn put_vesting(&mut self, schedule: VestingSchedule) -> Result<()> {
        self.require_instrument(schedule.instrument_id)?;
        self.vesting
            .insert((schedule.account_id, schedule.instrument_id), schedule);
        Ok(())
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// Whether a refund of `trade` is committed or staged.
    pub fn is_refunded(&self, trade: TradeId) -> bool {
        self.store.is_refunded(trade)
            || self
                .entries
                .iter()
                .any(|e| e.kind == LedgerEntryKind::IpoRefund && e.reference == Some(trade))
    }

    // =================================================================
    // New rows
    // =================================================================

    /// Stage a new account. The transaction owns its row from the start.
    pub fn create_account(&mut self, account: Account) -> AccountId {
        let id = account.id;
        let row = Arc::new(Row::new_held(account.clone()));
        self.accounts.insert(
            id,
            Held {
                row,
                staged: account,
                fresh: true,
            },
        );
        id
    }

    /// Stage a new instrument under a symbol reserved at commit.
    pub fn create_instrument(&mut self, instrument: Instrument) -> InstrumentId {
        let id = instrument.id;
        self.symbols.push((instrument.symbol.clone(), id));
        let staged = InstrumentRow::new(instrument);
        let row = Arc::new(Row::new_held(staged.clone()));
        self.instruments.insert(
            id,
            Held {
                row,
                staged,
                fresh: true,
            },
        );
        id
    }

    pub fn next_sequence(&self) -> u64 {
        self.store.next_sequence()
    }

    /// Buffer an event for release after commit.
    pub fn emit(&mut self, event: MarketEvent) {
        self.events.push(event);
    }

    // =================================================================
    // Commit
    // =================================================================

    /// Apply every staged write atomically and release the locks.
    ///
    /// Returns the buffered events.
    ///
    /// # Errors
    /// `DuplicateSymbol` if another transaction listed one of this
    /// transaction's symbols first; nothing is written in that case.
    pub fn commit(mut self) -> Result<Vec<MarketEvent>> {
        let store = self.store;
        let _gate = write(&store.commit_gate);

        {
            let mut symbols = lock(&store.symbols);
            if let Some((taken, _)) = self.symbols.iter().find(|(s, _)| symbols.contains_key(s)) {
                return Err(BourseError::DuplicateSymbol(taken.to_string()));
            }
            for (symbol, id) in self.symbols.drain(..) {
                symbols.insert(symbol, id);
            }
        }

        for (id, held) in &self.instruments {
            held.row.set(held.staged.clone());
            if held.fresh {
                write(&store.instruments).insert(*id, Arc::clone(&held.row));
            }
        }
        for (id, held) in &self.accounts {
            held.row.set(held.staged.clone());
            if held.fresh {
                write(&store.accounts).insert(*id, Arc::clone(&held.row));
            }
        }

        {
            let mut holdings = lock(&store.holdings);
            for (key, holding) in self.holdings.drain() {
                if holding.is_empty() {
                    holdings.remove(&key);
                } else {
                    holdings.insert(key, holding);
                }
            }
        }
        lock(&store.orders).extend(self.orders.drain());
        lock(&store.vesting).extend(self.vesting.drain());
        lock(&store.trades).append(&mut self.trades);
        {
            let mut ledger = lock(&store.ledger);
            let mut refunded = lock(&store.refunded);
            for entry in self.entries.drain(..) {
                if entry.kind == LedgerEntryKind::IpoRefund {
                    if let Some(trade) = entry.reference {
                        refunded.insert(trade);
                    }
                }
                ledger.entry(entry.account_id).or_default().push(entry);
            }
        }

        debug!(
            instruments = self.instruments.len(),
            accounts = self.accounts.len(),
            events = self.events.len(),
            "transaction committed"
        );
        Ok(std::mem::take(&mut self.events))
    }
}

impl Drop for Tx<'_> {
    fn drop(&mut self) {
        for held in self.instruments.values() {
            held.row.release();
        }
        for held in self.accounts.values() {
            held.row.release();
        }
    }
}
