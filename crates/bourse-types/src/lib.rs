//! # bourse-types
//!
//! Shared entities, errors, and configuration for the **Bourse** listing
//! exchange.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`InstrumentId`], [`OrderId`], [`TradeId`], [`LedgerEntryId`], [`Symbol`]
//! - **Accounts**: [`Account`], [`BalanceChange`]
//! - **Audit trail**: [`LedgerEntry`], [`LedgerEntryKind`]
//! - **Instruments**: [`Instrument`], [`InstrumentStatus`], [`IpoTerms`]
//! - **Holdings**: [`Holding`] (constructor-enforced `quantity == available + locked`)
//! - **Order model**: [`Order`], [`OrderSide`], [`OrderType`], [`OrderStatus`]
//! - **Trade model**: [`Trade`]
//! - **Vesting**: [`VestingSchedule`], [`VestingCheckpoint`]
//! - **Configuration**: [`EngineConfig`], [`IpoConfig`], [`RetryPolicy`], [`MatchAtomicity`]
//! - **Events**: [`MarketEvent`]
//! - **Time**: [`Clock`], [`SystemClock`], [`ManualClock`]
//! - **Errors**: [`BourseError`] with `BR_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod account;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod holding;
pub mod ids;
pub mod instrument;
pub mod ledger;
pub mod order;
pub mod trade;
pub mod vesting;

// Re-export all primary types at crate root for ergonomic imports:
//   use bourse_types::{Order, OrderSide, Trade, Holding, ...};

pub use account::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use holding::*;
pub use ids::*;
pub use instrument::*;
pub use ledger::*;
pub use order::*;
pub use trade::*;
pub use vesting::*;

// Constants are accessed via `bourse_types::constants::FOO`
// (not re-exported to avoid name collisions).
