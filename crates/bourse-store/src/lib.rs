//! # bourse-store
//!
//! **Persistence collaborator for Bourse.**
//!
//! An in-memory store offering what the engine requires of any backend:
//!
//! - **Row-level exclusive locks** on instruments and accounts, held for
//!   the lifetime of a transaction ("select for update")
//! - **Fixed lock order**: instruments (ascending id) before accounts
//!   (ascending id); out-of-order requests fail with `LockOrderViolation`
//!   instead of risking deadlock
//! - **Atomic commit**: all writes are staged in the [`Tx`] and applied
//!   together, or discarded on error
//! - **Bounded retry** of infra contention (`LockTimeout`,
//!   `SerializationConflict`) via [`MemoryStore::transaction`]
//! - **Snapshot reads** for the query surface, without row locks
//!
//! Holdings, orders, trades, vesting schedules and ledger entries are not
//! locked individually; they are covered by the instrument and account
//! locks of the transaction touching them.

pub mod memory;
pub mod retry;
mod row;
pub mod tx;

pub use memory::{Committed, InstrumentRow, MemoryStore, StoreSnapshot};
pub use retry::with_retry;
pub use tx::Tx;
