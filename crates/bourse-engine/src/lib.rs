//! # bourse-engine
//!
//! **Business components of the Bourse listing exchange.**
//!
//! Everything runs through one [`Exchange`] built from injected
//! collaborators: a [`MemoryStore`](bourse_store::MemoryStore), a
//! [`Clock`](bourse_types::Clock) and an [`EventSink`]. Each business
//! action is one store transaction holding exclusive locks on the rows it
//! touches:
//!
//! | Action | Locks |
//! |---|---|
//! | `open_account` | the new account |
//! | `claim_login_bonus` | account |
//! | `submit_instrument` | creator, the new instrument |
//! | `buy_ipo` | instrument, buyer |
//! | `place_order` | instrument, placing account, crossing counterparties |
//! | `cancel_order` | instrument, owner |
//! | IPO ticks, refunds | instrument, buyer |
//! | `tick_vesting` | instrument, grant holders |
//!
//! Domain errors surface immediately; lock timeouts and serialization
//! conflicts are retried by the store up to the configured policy.
//!
//! ## Periodic entry points
//!
//! The host calls these on its own timers. All are idempotent and
//! isolate failures per instrument:
//!
//! - [`Exchange::tick_ipo_pricing`]: refresh cached auction prices
//! - [`Exchange::tick_ipo_expiry`]: resolve expired auctions, refund
//!   failed ones
//! - [`Exchange::tick_vesting`]: unlock creator shares

pub mod accounts;
pub mod audit;
pub mod events;
pub mod exchange;
pub mod instruments;
pub mod ipo;
pub mod matching;
pub mod queries;
pub mod scheduler;
pub mod vesting;

pub use audit::{InvariantAuditor, Violation};
pub use events::{EventSink, NoopSink, RecordingSink};
pub use exchange::Exchange;
pub use matching::PlacedOrder;
pub use scheduler::TickReport;
