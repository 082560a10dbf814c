//! Vesting arithmetic.
//!
//! The unlock target at any moment is `floor(total_granted * fraction)`
//! where `fraction` belongs to the highest checkpoint whose day offset
//! has been reached.

use bourse_types::{VestingCheckpoint, VestingSchedule};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Whole days from `starts_at` to `now`, never negative.
#[must_use]
pub fn days_elapsed(starts_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    u32::try_from((now - starts_at).num_days().max(0)).unwrap_or(u32::MAX)
}

/// Cumulative fraction of the highest checkpoint reached by `days`.
#[must_use]
pub fn reached_fraction(checkpoints: &[VestingCheckpoint], days: u32) -> Decimal {
    checkpoints
        .iter()
        .filter(|cp| cp.day_offset <= days)
        .map(|cp| cp.cumulative_fraction)
        .max()
        .unwrap_or(Decimal::ZERO)
}

/// `floor(total * fraction)`, capped at `total`.
#[must_use]
pub fn target_unlocked(total: u64, fraction: Decimal) -> u64 {
    (Decimal::from(total) * fraction)
        .floor()
        .to_u64()
        .unwrap_or(0)
        .min(total)
}

/// Shares of `schedule` that should be unlocked at `now`.
#[must_use]
pub fn vesting_target(schedule: &VestingSchedule, now: DateTime<Utc>) -> u64 {
    let days = days_elapsed(schedule.starts_at, now);
    target_unlocked(
        schedule.total_granted,
        reached_fraction(&schedule.checkpoints, days),
    )
}

#[cfg(test)]
mod tests {
    use bourse_types::{AccountId, InstrumentId, default_vesting_checkpoints};
    use chrono::Duration;

    use super::*;

    fn schedule(start: DateTime<Utc>) -> VestingSchedule {
        VestingSchedule::new(
            AccountId::new(),
            InstrumentId::new(),
            20,
            default_vesting_checkpoints(),
            start,
        )
        .unwrap()
    }

    #[test]
    fn reference_days() {
        let start = Utc::now();
        let s = schedule(start);
        assert_eq!(vesting_target(&s, start), 0);
        assert_eq!(vesting_target(&s, start + Duration::days(6)), 0);
        assert_eq!(vesting_target(&s, start + Duration::days(7)), 4);
        assert_eq!(vesting_target(&s, start + Duration::days(10)), 4);
        assert_eq!(vesting_target(&s, start + Duration::days(40)), 14);
        assert_eq!(vesting_target(&s, start + Duration::days(365)), 20);
    }

    #[test]
    fn partial_day_does_not_count() {
        let start = Utc::now();
        let almost = start + Duration::days(7) - Duration::seconds(1);
        assert_eq!(days_elapsed(start, almost), 6);
        assert_eq!(days_elapsed(start, start - Duration::days(3)), 0);
    }

    #[test]
    fn target_floors() {
        assert_eq!(target_unlocked(3, Decimal::new(5, 1)), 1);
        assert_eq!(target_unlocked(0, Decimal::ONE), 0);
        assert_eq!(target_unlocked(7, Decimal::ONE), 7);
    }
}
