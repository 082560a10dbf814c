//! # bourse-ledger
//!
//! Funds movement and admission rules for Bourse.
//!
//! - [`ledger`]: `debit` / `credit` against an [`Account`](bourse_types::Account),
//!   each producing one [`LedgerEntry`](bourse_types::LedgerEntry)
//! - [`chain`]: SHA-256 chaining of an account's entries and chain verification
//! - [`fees`]: the flat fee model applied to trade notional
//! - [`validator`]: order admission checks run before matching
//!
//! Everything here is pure: callers supply the records and persist the
//! results inside their own transaction.

pub mod chain;
pub mod fees;
pub mod ledger;
pub mod validator;

pub use chain::{GENESIS_DIGEST, compute_digest, digest_hex, verify_chain};
pub use fees::{FillCosts, fee_for, fill_costs};
pub use ledger::{PostingDetails, credit, debit};
pub use validator::OrderValidator;
