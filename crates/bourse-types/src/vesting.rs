//! Vesting schedules for creator share grants.
//!
//! A schedule is an ascending list of `(day_offset, cumulative_fraction)`
//! checkpoints. `unlocked` only ever increases.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, BourseError, InstrumentId, Result};

/// One point on a vesting curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingCheckpoint {
    pub day_offset: u32,
    /// Fraction of the grant unlocked once `day_offset` days have passed.
    pub cumulative_fraction: Decimal,
}

impl VestingCheckpoint {
    #[must_use]
    pub fn new(day_offset: u32, cumulative_fraction: Decimal) -> Self {
        Self {
            day_offset,
            cumulative_fraction,
        }
    }
}

/// Check that checkpoints are strictly ascending in day, non-decreasing in
/// fraction, within `[0, 1]`, and end at 100%.
pub fn validate_checkpoints(checkpoints: &[VestingCheckpoint]) -> Result<()> {
    let Some(last) = checkpoints.last() else {
        return Err(BourseError::InvalidVestingSchedule {
            reason: "schedule has no checkpoints".to_string(),
        });
    };
    for cp in checkpoints {
        if cp.cumulative_fraction < Decimal::ZERO || cp.cumulative_fraction > Decimal::ONE {
            return Err(BourseError::InvalidVestingSchedule {
                reason: format!(
                    "fraction {} at day {} outside [0, 1]",
                    cp.cumulative_fraction, cp.day_offset
                ),
            });
        }
    }
    for pair in checkpoints.windows(2) {
        if pair[1].day_offset <= pair[0].day_offset {
            return Err(BourseError::InvalidVestingSchedule {
                reason: format!(
                    "day {} does not follow day {}",
                    pair[1].day_offset, pair[0].day_offset
                ),
            });
        }
        if pair[1].cumulative_fraction < pair[0].cumulative_fraction {
            return Err(BourseError::InvalidVestingSchedule {
                reason: format!("fraction decreases at day {}", pair[1].day_offset),
            });
        }
    }
    if last.cumulative_fraction != Decimal::ONE {
        return Err(BourseError::InvalidVestingSchedule {
            reason: format!("final fraction must be 1, got {}", last.cumulative_fraction),
        });
    }
    Ok(())
}

/// Vesting state of one (account, instrument) grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingSchedule {
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub total_granted: u64,
    unlocked: u64,
    pub checkpoints: Vec<VestingCheckpoint>,
    /// Day zero of the schedule (the instrument's creation time).
    pub starts_at: DateTime<Utc>,
}

impl VestingSchedule {
    /// # Errors
    /// `InvalidVestingSchedule` if the checkpoints are malformed.
    pub fn new(
        account_id: AccountId,
        instrument_id: InstrumentId,
        total_granted: u64,
        checkpoints: Vec<VestingCheckpoint>,
        starts_at: DateTime<Utc>,
    ) -> Result<Self> {
        validate_checkpoints(&checkpoints)?;
        Ok(Self {
            account_id,
            instrument_id,
            total_granted,
            unlocked: 0,
            checkpoints,
            starts_at,
        })
    }

    #[must_use]
    pub fn unlocked(&self) -> u64 {
        self.unlocked
    }

    #[must_use]
    pub fn is_fully_vested(&self) -> bool {
        self.unlocked >= self.total_granted
    }

    /// Raise `unlocked` to `target`, returning the newly unlocked delta.
    ///
    /// A target at or below the current value is a no-op (returns 0).
    pub fn advance_to(&mut self, target: u64) -> u64 {
        let target = target.min(self.total_granted);
        if target <= self.unlocked {
            return 0;
        }
        let delta = target - self.unlocked;
        self.unlocked = target;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(n: i64) -> Decimal {
        Decimal::new(n, 2)
    }

    fn standard() -> Vec<VestingCheckpoint> {
        vec![
            VestingCheckpoint::new(0, pct(0)),
            VestingCheckpoint::new(7, pct(20)),
            VestingCheckpoint::new(14, pct(40)),
            VestingCheckpoint::new(30, pct(70)),
            VestingCheckpoint::new(60, pct(100)),
        ]
    }

    #[test]
    fn standard_schedule_is_valid() {
        assert!(validate_checkpoints(&standard()).is_ok());
    }

    #[test]
    fn rejects_malformed_schedules() {
        assert!(validate_checkpoints(&[]).is_err());
        let mut unsorted = standard();
        unsorted.swap(1, 2);
        assert!(validate_checkpoints(&unsorted).is_err());
        let mut short = standard();
        short.pop();
        assert!(validate_checkpoints(&short).is_err());
        let over = vec![VestingCheckpoint::new(0, pct(120))];
        assert!(validate_checkpoints(&over).is_err());
    }

    #[test]
    fn advance_is_monotonic() {
        let mut s =
            VestingSchedule::new(AccountId::new(), InstrumentId::new(), 20, standard(), Utc::now())
                .unwrap();
        assert_eq!(s.advance_to(4), 4);
        assert_eq!(s.advance_to(4), 0);
        assert_eq!(s.advance_to(2), 0);
        assert_eq!(s.unlocked(), 4);
        assert_eq!(s.advance_to(14), 10);
        assert_eq!(s.advance_to(99), 6);
        assert!(s.is_fully_vested());
    }
}
