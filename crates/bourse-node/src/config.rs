//! Host configuration.
//!
//! Loaded from an optional JSON file, then individual values are
//! overridden from `BOURSE_*` environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `BOURSE_LOG_FORMAT` | `log_format` (`pretty` or `json`) |
//! | `BOURSE_FEE_RATE` | `engine.fee_rate` |
//! | `BOURSE_STARTING_BALANCE` | `engine.starting_balance` |
//! | `BOURSE_MATCH_ATOMICITY` | `engine.match_atomicity` |
//! | `BOURSE_IPO_PRICING_SECS` | `ticks.ipo_pricing_secs` |
//! | `BOURSE_IPO_EXPIRY_SECS` | `ticks.ipo_expiry_secs` |
//! | `BOURSE_VESTING_SECS` | `ticks.vesting_secs` |
//! | `BOURSE_EVENT_BUFFER` | `event_buffer` |

use std::{path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use bourse_types::{EngineConfig, MatchAtomicity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => bail!("unknown log format {other:?}"),
        }
    }
}

/// Seconds between passes of each periodic tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickCadence {
    pub ipo_pricing_secs: u64,
    pub ipo_expiry_secs: u64,
    pub vesting_secs: u64,
}

impl Default for TickCadence {
    fn default() -> Self {
        Self {
            ipo_pricing_secs: 3_600,
            ipo_expiry_secs: 300,
            vesting_secs: 3_600,
        }
    }
}

impl TickCadence {
    pub fn ipo_pricing(&self) -> Duration {
        Duration::from_secs(self.ipo_pricing_secs)
    }

    pub fn ipo_expiry(&self) -> Duration {
        Duration::from_secs(self.ipo_expiry_secs)
    }

    pub fn vesting(&self) -> Duration {
        Duration::from_secs(self.vesting_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub engine: EngineConfig,
    pub ticks: TickCadence,
    pub log_format: LogFormat,
    /// Capacity of the event relay channel.
    pub event_buffer: usize,
}

impl NodeConfig {
    /// File (or defaults), then process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config JSON in {}", path.display()))
    }

    /// Apply `BOURSE_*` overrides resolved through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T>(key: &str, raw: &str) -> Result<T>
        where
            T: FromStr,
            T::Err: std::fmt::Display,
        {
            raw.trim()
                .parse()
                .map_err(|err| anyhow::anyhow!("{key}={raw:?}: {err}"))
        }

        if let Some(raw) = lookup("BOURSE_LOG_FORMAT") {
            self.log_format = parsed("BOURSE_LOG_FORMAT", &raw)?;
        }
        if let Some(raw) = lookup("BOURSE_FEE_RATE") {
            self.engine.fee_rate = parsed::<Decimal>("BOURSE_FEE_RATE", &raw)?;
        }
        if let Some(raw) = lookup("BOURSE_STARTING_BALANCE") {
            self.engine.starting_balance = parsed::<Decimal>("BOURSE_STARTING_BALANCE", &raw)?;
        }
        if let Some(raw) = lookup("BOURSE_MATCH_ATOMICITY") {
            self.engine.match_atomicity = match raw.trim() {
                "single_transaction" => MatchAtomicity::SingleTransaction,
                "chained_transactions" => MatchAtomicity::ChainedTransactions,
                other => bail!("BOURSE_MATCH_ATOMICITY={other:?}: expected single_transaction or chained_transactions"),
            };
        }
        if let Some(raw) = lookup("BOURSE_IPO_PRICING_SECS") {
            self.ticks.ipo_pricing_secs = parsed("BOURSE_IPO_PRICING_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BOURSE_IPO_EXPIRY_SECS") {
            self.ticks.ipo_expiry_secs = parsed("BOURSE_IPO_EXPIRY_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BOURSE_VESTING_SECS") {
            self.ticks.vesting_secs = parsed("BOURSE_VESTING_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BOURSE_EVENT_BUFFER") {
            self.event_buffer = parsed("BOURSE_EVENT_BUFFER", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate().context("invalid engine config")?;
        let ticks = &self.ticks;
        if ticks.ipo_pricing_secs == 0 || ticks.ipo_expiry_secs == 0 || ticks.vesting_secs == 0 {
            bail!("tick cadences must be at least one second");
        }
        if self.event_buffer == 0 {
            bail!("event_buffer must be positive");
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            ticks: TickCadence::default(),
            log_format: LogFormat::default(),
            event_buffer: 1_024,
        }
    }
}
