//! # bourse-matchcore
//!
//! **Pure computation for the Bourse exchange.**
//!
//! Nothing in this crate touches balances, holdings or the store. It
//! owns the data structures and arithmetic the engine runs inside its
//! transactions:
//!
//! - **Order book**: per-instrument bids/asks in price-time priority
//! - **Matcher**: sweep an incoming order across the opposite side at
//!   maker prices, with self-trade prevention
//! - **Auction curve**: the linear Dutch-auction price
//! - **Vesting math**: checkpoint lookup and unlock targets

pub mod auction;
pub mod matcher;
pub mod orderbook;
pub mod price_level;
pub mod vesting;

pub use auction::{auction_price, price_at};
pub use matcher::{Fill, FillOutcome, MatchReport, best_counterparty, crossing_accounts, match_incoming};
pub use orderbook::{BookSnapshot, LevelSummary, OrderBook};
pub use price_level::{BookEntry, PriceLevel};
pub use vesting::{days_elapsed, reached_fraction, target_unlocked, vesting_target};
