//! The in-memory store and its snapshot reads.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use bourse_matchcore::{BookSnapshot, OrderBook};
use bourse_types::{
    Account, AccountId, BourseError, GENESIS_DIGEST, Holding, Instrument, InstrumentId,
    LedgerEntry, MarketEvent, Order, OrderId, Result, RetryPolicy, Symbol, Trade, TradeId,
    VestingSchedule,
};

use crate::retry::with_retry;
use crate::row::{Row, lock, read};
use crate::tx::Tx;

/// An instrument together with its order book; locked as one row.
#[derive(Debug, Clone)]
pub struct InstrumentRow {
    pub instrument: Instrument,
    pub book: OrderBook,
}

impl InstrumentRow {
    #[must_use]
    pub fn new(instrument: Instrument) -> Self {
        let book = OrderBook::new(instrument.id);
        Self { instrument, book }
    }
}

/// Value and events of a committed transaction.
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    /// Events buffered by the transaction, released only after commit.
    pub events: Vec<MarketEvent>,
}

/// A consistent copy of every table, for auditing.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub instruments: Vec<InstrumentRow>,
    pub accounts: Vec<Account>,
    pub holdings: Vec<Holding>,
    pub orders: Vec<Order>,
    pub vesting: Vec<VestingSchedule>,
    pub trades: Vec<Trade>,
    pub ledger: HashMap<AccountId, Vec<LedgerEntry>>,
}

/// Shared state. Construct one per exchange and pass it to the engine.
#[derive(Debug)]
pub struct MemoryStore {
    pub(crate) instruments: RwLock<HashMap<InstrumentId, Arc<Row<InstrumentRow>>>>,
    pub(crate) accounts: RwLock<HashMap<AccountId, Arc<Row<Account>>>>,
    pub(crate) holdings: Mutex<HashMap<(AccountId, InstrumentId), Holding>>,
    pub(crate) orders: Mutex<HashMap<OrderId, Order>>,
    pub(crate) vesting: Mutex<HashMap<(AccountId, InstrumentId), VestingSchedule>>,
    pub(crate) trades: Mutex<Vec<Trade>>,
    pub(crate) ledger: Mutex<HashMap<AccountId, Vec<LedgerEntry>>>,
    pub(crate) refunded: Mutex<HashSet<TradeId>>,
    pub(crate) symbols: Mutex<HashMap<Symbol, InstrumentId>>,
    /// Commits take it exclusively; snapshot reads share it.
    pub(crate) commit_gate: RwLock<()>,
    sequence: AtomicU64,
    retry: RetryPolicy,
}

impl MemoryStore {
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            instruments: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            holdings: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            vesting: Mutex::new(HashMap::new()),
            trades: Mutex::new(Vec::new()),
            ledger: Mutex::new(HashMap::new()),
            refunded: Mutex::new(HashSet::new()),
            symbols: Mutex::new(HashMap::new()),
            commit_gate: RwLock::new(()),
            sequence: AtomicU64::new(1),
            retry,
        }
    }

    pub(crate) fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.retry.lock_wait_ms)
    }

    /// Next admission sequence; strictly increasing.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Open a transaction. Prefer [`MemoryStore::transaction`], which
    /// also commits and retries.
    #[must_use]
    pub fn begin(&self) -> Tx<'_> {
        Tx::new(self)
    }

    /// Run `body` in a fresh transaction and commit it, retrying infra
    /// contention per the store's [`RetryPolicy`].
    ///
    /// `body` may run more than once; each attempt starts from a clean
    /// transaction.
    pub fn transaction<T, F>(&self, label: &str, mut body: F) -> Result<Committed<T>>
    where
        F: FnMut(&mut Tx<'_>) -> Result<T>,
    {
        with_retry(&self.retry, label, || {
            let mut tx = self.begin();
            let value = body(&mut tx)?;
            let events = tx.commit()?;
            Ok(Committed { value, events })
        })
    }

    pub(crate) fn instrument_row(&self, id: InstrumentId) -> Result<Arc<Row<InstrumentRow>>> {
        read(&self.instruments)
            .get(&id)
            .cloned()
            .ok_or(BourseError::InstrumentNotFound(id))
    }

    pub(crate) fn account_row(&self, id: AccountId) -> Result<Arc<Row<Account>>> {
        read(&self.accounts)
            .get(&id)
            .cloned()
            .ok_or(BourseError::AccountNotFound(id))
    }

    pub(crate) fn ledger_head(&self, account: AccountId) -> [u8; 32] {
        lock(&self.ledger)
            .get(&account)
            .and_then(|entries| entries.last())
            .map_or(GENESIS_DIGEST, |entry| entry.digest)
    }

    // =================================================================
    // Snapshot reads
    // =================================================================

    pub fn instrument(&self, id: InstrumentId) -> Result<Instrument> {
        let _gate = read(&self.commit_gate);
        Ok(self.instrument_row(id)?.get().instrument)
    }

    /// All instruments, oldest listing first.
    pub fn instruments(&self) -> Vec<Instrument> {
        let _gate = read(&self.commit_gate);
        let mut all: Vec<Instrument> = read(&self.instruments)
            .values()
            .map(|row| row.get().instrument)
            .collect();
        all.sort_by_key(|i| (i.created_at, i.id));
        all
    }

    pub fn instrument_by_symbol(&self, symbol: &Symbol) -> Result<Instrument> {
        let id = lock(&self.symbols).get(symbol).copied().ok_or_else(|| {
            BourseError::InvalidSymbol {
                reason: format!("no instrument listed as {symbol}"),
            }
        })?;
        self.instrument(id)
    }

    pub fn book_snapshot(&self, id: InstrumentId, depth: usize) -> Result<BookSnapshot> {
        let _gate = read(&self.commit_gate);
        let row = self.instrument_row(id)?.get();
        Ok(row.book.snapshot(depth, row.instrument.last_trade_price))
    }

    pub fn account(&self, id: AccountId) -> Result<Account> {
        let _gate = read(&self.commit_gate);
        Ok(self.account_row(id)?.get())
    }

    pub fn holding(&self, account: AccountId, instrument: InstrumentId) -> Option<Holding> {
        let _gate = read(&self.commit_gate);
        lock(&self.holdings).get(&(account, instrument)).cloned()
    }

    /// Holdings of one account.
    pub fn holdings_of(&self, account: AccountId) -> Vec<Holding> {
        let _gate = read(&self.commit_gate);
        let mut held: Vec<Holding> = lock(&self.holdings)
            .values()
            .filter(|h| h.account_id == account)
            .cloned()
            .collect();
        held.sort_by_key(|h| h.instrument_id);
        held
    }

    pub fn order(&self, id: OrderId) -> Result<Order> {
        let _gate = read(&self.commit_gate);
        lock(&self.orders)
            .get(&id)
            .cloned()
            .ok_or(BourseError::OrderNotFound(id))
    }

    /// Orders of one account, oldest first.
    pub fn orders_of(&self, account: AccountId) -> Vec<Order> {
        let _gate = read(&self.commit_gate);
        let mut orders: Vec<Order> = lock(&self.orders)
            .values()
            .filter(|o| o.account_id == account)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.sequence);
        orders
    }

    /// Trades of one instrument in execution order.
    pub fn trades_for(&self, instrument: InstrumentId) -> Vec<Trade> {
        let _gate = read(&self.commit_gate);
        lock(&self.trades)
            .iter()
            .filter(|t| t.instrument_id == instrument)
            .cloned()
            .collect()
    }

    /// Ledger entries of one account, oldest first.
    pub fn ledger_of(&self, account: AccountId) -> Vec<LedgerEntry> {
        let _gate = read(&self.commit_gate);
        lock(&self.ledger).get(&account).cloned().unwrap_or_default()
    }

    /// An account and its ledger, read at the same commit boundary.
    pub fn account_with_ledger(&self, id: AccountId) -> Result<(Account, Vec<LedgerEntry>)> {
        let _gate = read(&self.commit_gate);
        let account = self.account_row(id)?.get();
        let entries = lock(&self.ledger).get(&id).cloned().unwrap_or_default();
        Ok((account, entries))
    }

    pub fn vesting_schedules(&self) -> Vec<VestingSchedule> {
        let _gate = read(&self.commit_gate);
        let mut all: Vec<VestingSchedule> = lock(&self.vesting).values().cloned().collect();
        all.sort_by_key(|s| (s.instrument_id, s.account_id));
        all
    }

    pub fn is_refunded(&self, trade: TradeId) -> bool {
        lock(&self.refunded).contains(&trade)
    }

    /// Every table at one commit boundary.
    pub fn snapshot(&self) -> StoreSnapshot {
        let _gate = read(&self.commit_gate);
        StoreSnapshot {
            instruments: read(&self.instruments).values().map(|row| row.get()).collect(),
            accounts: read(&self.accounts).values().map(|row| row.get()).collect(),
            holdings: lock(&self.holdings).values().cloned().collect(),
            orders: lock(&self.orders).values().cloned().collect(),
            vesting: lock(&self.vesting).values().cloned().collect(),
            trades: lock(&self.trades).clone(),
            ledger: lock(&self.ledger).clone(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
