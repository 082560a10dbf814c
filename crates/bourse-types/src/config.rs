//! Configuration types for the exchange engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BourseError, Result, VestingCheckpoint, constants, vesting::validate_checkpoints};

/// Dutch-auction parameters applied to every new listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpoConfig {
    pub shares_offered: u64,
    pub creator_shares: u64,
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub duration_hours: u32,
    pub success_threshold: Decimal,
}

impl Default for IpoConfig {
    fn default() -> Self {
        Self {
            shares_offered: constants::DEFAULT_IPO_SHARES_OFFERED,
            creator_shares: constants::DEFAULT_CREATOR_SHARES,
            start_price: Decimal::new(200, 2), // 2.00
            end_price: Decimal::new(10, 2),    // 0.10
            duration_hours: constants::DEFAULT_IPO_DURATION_HOURS,
            success_threshold: Decimal::new(5, 1), // 50%
        }
    }
}

/// How a multi-fill match pass is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchAtomicity {
    /// Admission and every fill of one pass commit together or not at all.
    #[default]
    SingleTransaction,
    /// Admission and each fill commit independently; a mid-scan failure
    /// keeps earlier fills.
    ChainedTransactions,
}

/// Bounded retry of infra contention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    /// Maximum wait for one row lock before `LockTimeout`.
    pub lock_wait_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_RETRY_ATTEMPTS,
            backoff_ms: constants::DEFAULT_RETRY_BACKOFF_MS,
            lock_wait_ms: constants::DEFAULT_LOCK_WAIT_MS,
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Flat fee applied to trade notional, charged to each side independently.
    pub fee_rate: Decimal,
    /// Charged to the creator when an instrument is submitted.
    pub submission_fee: Decimal,
    /// Credited to every newly opened account.
    pub starting_balance: Decimal,
    /// Daily login bonus.
    pub login_bonus: Decimal,
    pub ipo: IpoConfig,
    pub vesting_checkpoints: Vec<VestingCheckpoint>,
    pub match_atomicity: MatchAtomicity,
    pub self_trade_prevention: bool,
    pub max_order_quantity: u64,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_rate: Decimal::new(5, 3), // 0.5%
            submission_fee: Decimal::new(50, 0),
            starting_balance: Decimal::new(1_000, 0),
            login_bonus: Decimal::new(10, 0),
            ipo: IpoConfig::default(),
            vesting_checkpoints: default_vesting_checkpoints(),
            match_atomicity: MatchAtomicity::default(),
            self_trade_prevention: true,
            max_order_quantity: constants::DEFAULT_MAX_ORDER_QUANTITY,
            retry: RetryPolicy::default(),
        }
    }
}

/// 0% at listing, then 20% / 40% / 70% / 100% at days 7 / 14 / 30 / 60.
#[must_use]
pub fn default_vesting_checkpoints() -> Vec<VestingCheckpoint> {
    vec![
        VestingCheckpoint::new(0, Decimal::ZERO),
        VestingCheckpoint::new(7, Decimal::new(20, 2)),
        VestingCheckpoint::new(14, Decimal::new(40, 2)),
        VestingCheckpoint::new(30, Decimal::new(70, 2)),
        VestingCheckpoint::new(60, Decimal::ONE),
    ]
}

impl EngineConfig {
    /// Reject inconsistent settings.
    pub fn validate(&self) -> Result<()> {
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            return Err(BourseError::Configuration(format!(
                "fee_rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }
        for (name, value) in [
            ("submission_fee", self.submission_fee),
            ("starting_balance", self.starting_balance),
            ("login_bonus", self.login_bonus),
        ] {
            if value.is_sign_negative() {
                return Err(BourseError::Configuration(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        let ipo = &self.ipo;
        if ipo.shares_offered == 0 {
            return Err(BourseError::Configuration(
                "ipo.shares_offered must be positive".to_string(),
            ));
        }
        if ipo.duration_hours == 0 {
            return Err(BourseError::Configuration(
                "ipo.duration_hours must be positive".to_string(),
            ));
        }
        if ipo.end_price <= Decimal::ZERO || ipo.end_price > ipo.start_price {
            return Err(BourseError::Configuration(format!(
                "ipo prices must satisfy 0 < end ({}) <= start ({})",
                ipo.end_price, ipo.start_price
            )));
        }
        if ipo.success_threshold <= Decimal::ZERO || ipo.success_threshold > Decimal::ONE {
            return Err(BourseError::Configuration(format!(
                "ipo.success_threshold must be in (0, 1], got {}",
                ipo.success_threshold
            )));
        }
        if self.max_order_quantity == 0 {
            return Err(BourseError::Configuration(
                "max_order_quantity must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(BourseError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        validate_checkpoints(&self.vesting_checkpoints)
            .map_err(|e| BourseError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.fee_rate, Decimal::new(5, 3));
        assert_eq!(cfg.ipo.shares_offered, 980);
        assert_eq!(cfg.ipo.creator_shares, 20);
        assert_eq!(cfg.match_atomicity, MatchAtomicity::SingleTransaction);
    }

    #[test]
    fn inverted_prices_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.ipo.end_price = Decimal::new(3, 0);
        assert!(matches!(cfg.validate(), Err(BourseError::Configuration(_))));
    }

    #[test]
    fn threshold_bounds() {
        let mut cfg = EngineConfig::default();
        cfg.ipo.success_threshold = Decimal::ZERO;
        assert!(cfg.validate().is_err());
        cfg.ipo.success_threshold = Decimal::ONE;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bad_vesting_is_a_config_error() {
        let mut cfg = EngineConfig::default();
        cfg.vesting_checkpoints.pop();
        assert!(matches!(cfg.validate(), Err(BourseError::Configuration(_))));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"fee_rate":"0.01","match_atomicity":"chained_transactions"}"#)
                .unwrap();
        assert_eq!(cfg.fee_rate, Decimal::new(1, 2));
        assert_eq!(cfg.match_atomicity, MatchAtomicity::ChainedTransactions);
        assert_eq!(cfg.ipo, IpoConfig::default());
    }
}
