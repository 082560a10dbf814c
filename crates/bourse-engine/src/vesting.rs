//! Vesting tick.

use std::collections::BTreeMap;

use bourse_matchcore::vesting_target;
use bourse_types::{InstrumentId, MarketEvent, Result, VestingSchedule};
use tracing::info;

use crate::Exchange;
use crate::scheduler::TickReport;

impl Exchange {
    /// Unlock every creator grant up to its current checkpoint.
    ///
    /// Idempotent: with no new checkpoint reached, nothing changes.
    pub fn tick_vesting(&self) -> TickReport {
        let mut by_instrument: BTreeMap<InstrumentId, Vec<VestingSchedule>> = BTreeMap::new();
        for schedule in self.store.vesting_schedules() {
            if !schedule.is_fully_vested() {
                by_instrument.entry(schedule.instrument_id).or_default().push(schedule);
            }
        }

        let mut report = TickReport::default();
        for (instrument_id, schedules) in by_instrument {
            let result = self.vest_instrument(instrument_id, &schedules);
            report.record("vesting", instrument_id, result);
        }
        report
    }

    fn vest_instrument(&self, instrument_id: InstrumentId, schedules: &[VestingSchedule]) -> Result<bool> {
        self.run("tick_vesting", |tx| {
            let now = self.now();
            tx.lock_instrument(instrument_id)?;
            tx.lock_accounts(schedules.iter().map(|s| s.account_id))?;

            let mut changed = false;
            for stale in schedules {
                let Some(mut schedule) = tx.vesting(stale.account_id, instrument_id)? else {
                    continue;
                };
                let delta = schedule.advance_to(vesting_target(&schedule, now));
                if delta == 0 {
                    continue;
                }
                tx.holding_mut(schedule.account_id, instrument_id)?.unlock(delta)?;
                info!(
                    account = %schedule.account_id,
                    instrument = %instrument_id,
                    delta,
                    unlocked = schedule.unlocked(),
                    total = schedule.total_granted,
                    "shares vested"
                );
                tx.emit(MarketEvent::SharesVested {
                    account_id: schedule.account_id,
                    instrument_id,
                    quantity: delta,
                    unlocked_total: schedule.unlocked(),
                });
                tx.put_vesting(schedule)?;
                changed = true;
            }
            Ok(changed)
        })
    }
}
