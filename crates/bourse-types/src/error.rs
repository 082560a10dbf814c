//! Error types for the Bourse exchange core.
//!
//! All errors use the `BR_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Funds / share errors
//! - 3xx: Instrument / auction errors
//! - 4xx: Account errors
//! - 5xx: Vesting errors
//! - 6xx: Persistence / infrastructure errors (retryable subset)
//! - 9xx: General / internal errors
//!
//! Only infrastructure contention (`LockTimeout`, `SerializationConflict`)
//! is ever retried; every domain error is surfaced to the caller as-is.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AccountId, InstrumentId, InstrumentStatus, OrderId, OrderStatus};

/// Central error enum for all Bourse operations.
#[derive(Debug, Error)]
pub enum BourseError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// The requested order does not exist.
    #[error("BR_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order failed validation (missing limit price, zero quantity, ...).
    #[error("BR_ERR_101: Invalid order parameters: {reason}")]
    InvalidOrderParameters { reason: String },

    /// The order is already FILLED or CANCELLED.
    #[error("BR_ERR_102: Order {order_id} cannot be cancelled in status {status}")]
    OrderNotCancellable {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// An account tried to act on another account's order.
    #[error("BR_ERR_103: Account {account} is not authorized to act on order {order_id}")]
    Unauthorized {
        account: AccountId,
        order_id: OrderId,
    },

    // =================================================================
    // Funds / Share Errors (2xx)
    // =================================================================
    /// Balance is below the amount to debit.
    #[error("BR_ERR_200: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    /// Available (unlocked) shares are below the requested quantity.
    #[error("BR_ERR_201: Insufficient shares: need {needed}, have {available}")]
    InsufficientShares { needed: u64, available: u64 },

    /// Requested quantity exceeds what the auction or book can supply.
    #[error("BR_ERR_202: Quantity {requested} exceeds available {available}")]
    QuantityExceedsAvailable { requested: u64, available: u64 },

    /// A monetary amount was zero, negative, or otherwise unusable.
    #[error("BR_ERR_203: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    // =================================================================
    // Instrument / Auction Errors (3xx)
    // =================================================================
    /// The requested instrument does not exist.
    #[error("BR_ERR_300: Instrument not found: {0}")]
    InstrumentNotFound(InstrumentId),

    /// Another instrument already uses this symbol.
    #[error("BR_ERR_301: Symbol already listed: {0}")]
    DuplicateSymbol(String),

    /// The symbol failed validation.
    #[error("BR_ERR_302: Invalid symbol: {reason}")]
    InvalidSymbol { reason: String },

    /// The instrument is not in IPO_ACTIVE.
    #[error("BR_ERR_303: Auction not active for {instrument} (status {status})")]
    AuctionNotActive {
        instrument: InstrumentId,
        status: InstrumentStatus,
    },

    /// The auction window has closed but expiry has not been resolved yet.
    #[error("BR_ERR_304: Auction for {instrument} ended at {ended_at}")]
    AuctionEnded {
        instrument: InstrumentId,
        ended_at: DateTime<Utc>,
    },

    /// Orders are only admitted while TRADING or IPO_FAILED.
    #[error("BR_ERR_305: Instrument {instrument} is not tradable in status {status}")]
    InstrumentNotTradable {
        instrument: InstrumentId,
        status: InstrumentStatus,
    },

    /// Lifecycle transitions are monotonic and happen exactly once.
    #[error("BR_ERR_306: Invalid status transition {from} -> {to}")]
    InvalidStatusTransition {
        from: InstrumentStatus,
        to: InstrumentStatus,
    },

    // =================================================================
    // Account Errors (4xx)
    // =================================================================
    /// The requested account does not exist.
    #[error("BR_ERR_400: Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The daily login bonus was already credited today.
    #[error("BR_ERR_401: Login bonus already claimed today by {0}")]
    BonusAlreadyClaimed(AccountId),

    // =================================================================
    // Vesting Errors (5xx)
    // =================================================================
    /// The vesting checkpoints are malformed.
    #[error("BR_ERR_500: Invalid vesting schedule: {reason}")]
    InvalidVestingSchedule { reason: String },

    /// Vesting would unlock more than the holding has locked.
    #[error("BR_ERR_501: Vesting unlock of {requested} exceeds locked {locked}")]
    VestingExceedsLocked { requested: u64, locked: u64 },

    // =================================================================
    // Persistence / Infrastructure Errors (6xx)
    // =================================================================
    /// A row lock could not be acquired within the configured wait.
    #[error("BR_ERR_600: Lock wait timeout on {resource}")]
    LockTimeout { resource: String },

    /// A concurrent writer invalidated this transaction's reads.
    #[error("BR_ERR_601: Serialization conflict: {reason}")]
    SerializationConflict { reason: String },

    /// Infra errors persisted through every retry attempt.
    #[error("BR_ERR_602: Transaction failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// A lock request would break the global acquisition order.
    #[error("BR_ERR_603: Lock order violation: {reason}")]
    LockOrderViolation { reason: String },

    /// A row was touched inside a transaction without holding its lock.
    #[error("BR_ERR_604: Row not locked in transaction: {resource}")]
    RowNotLocked { resource: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("BR_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Configuration error (invalid config file, inconsistent values, etc.).
    #[error("BR_ERR_901: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("BR_ERR_902: Serialization error: {0}")]
    Serialization(String),

    /// I/O error (config file, disk).
    #[error("BR_ERR_903: I/O error: {0}")]
    Io(String),

    /// A system invariant does not hold — critical safety alert.
    #[error("BR_ERR_904: Invariant violation: {reason}")]
    InvariantViolation { reason: String },
}

impl BourseError {
    /// Infra contention that the engine retries transparently.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::SerializationConflict { .. }
        )
    }

    /// HTTP-style status code for the transport adapter.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::OrderNotFound(_) | Self::InstrumentNotFound(_) | Self::AccountNotFound(_) => 404,
            Self::Unauthorized { .. } => 403,
            Self::OrderNotCancellable { .. }
            | Self::DuplicateSymbol(_)
            | Self::AuctionNotActive { .. }
            | Self::AuctionEnded { .. }
            | Self::InstrumentNotTradable { .. }
            | Self::InvalidStatusTransition { .. }
            | Self::BonusAlreadyClaimed(_) => 409,
            Self::InvalidOrderParameters { .. }
            | Self::InsufficientFunds { .. }
            | Self::InsufficientShares { .. }
            | Self::QuantityExceedsAvailable { .. }
            | Self::InvalidAmount { .. }
            | Self::InvalidSymbol { .. } => 422,
            Self::LockTimeout { .. }
            | Self::SerializationConflict { .. }
            | Self::RetriesExhausted { .. } => 503,
            Self::InvalidVestingSchedule { .. }
            | Self::VestingExceedsLocked { .. }
            | Self::LockOrderViolation { .. }
            | Self::RowNotLocked { .. }
            | Self::Internal(_)
            | Self::Configuration(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::InvariantViolation { .. } => 500,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, BourseError>;

impl From<std::io::Error> for BourseError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BourseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = BourseError::OrderNotFound(OrderId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("BR_ERR_100"), "Got: {msg}");
    }

    #[test]
    fn insufficient_funds_display() {
        let err = BourseError::InsufficientFunds {
            needed: Decimal::new(10_5525, 4),
            available: Decimal::new(500, 2),
        };
        let msg = format!("{err}");
        assert!(msg.contains("BR_ERR_200"));
        assert!(msg.contains("10.5525"));
        assert!(msg.contains("5.00"));
    }

    #[test]
    fn only_infra_errors_are_retryable() {
        assert!(
            BourseError::LockTimeout {
                resource: "account".into()
            }
            .is_retryable()
        );
        assert!(
            BourseError::SerializationConflict {
                reason: "x".into()
            }
            .is_retryable()
        );
        assert!(
            !BourseError::InsufficientFunds {
                needed: Decimal::ONE,
                available: Decimal::ZERO,
            }
            .is_retryable()
        );
        assert!(!BourseError::RetriesExhausted { attempts: 3, last: "x".into() }.is_retryable());
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(BourseError::InstrumentNotFound(InstrumentId::new()).status_code(), 404);
        assert_eq!(
            BourseError::Unauthorized {
                account: AccountId::new(),
                order_id: OrderId::new(),
            }
            .status_code(),
            403
        );
        assert_eq!(
            BourseError::InsufficientShares { needed: 5, available: 1 }.status_code(),
            422
        );
        assert_eq!(
            BourseError::InstrumentNotTradable {
                instrument: InstrumentId::new(),
                status: InstrumentStatus::IpoActive,
            }
            .status_code(),
            409
        );
    }

    #[test]
    fn all_errors_have_br_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(BourseError::BonusAlreadyClaimed(AccountId::new())),
            Box::new(BourseError::InvalidVestingSchedule { reason: "x".into() }),
            Box::new(BourseError::Internal("test".into())),
            Box::new(BourseError::InvariantViolation { reason: "x".into() }),
            Box::new(BourseError::InvalidStatusTransition {
                from: InstrumentStatus::Trading,
                to: InstrumentStatus::IpoActive,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(msg.starts_with("BR_ERR_"), "Error missing BR_ERR_ prefix: {msg}");
        }
    }
}
