//! Periodic tick driver.
//!
//! Ticks are synchronous and take row locks, so each pass runs on the
//! blocking pool. Passes never overlap: a slow pass delays the next one
//! instead of stacking up.

use std::sync::Arc;

use bourse_engine::{Exchange, TickReport};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::TickCadence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    IpoPricing,
    IpoExpiry,
    Vesting,
}

impl Tick {
    pub fn name(self) -> &'static str {
        match self {
            Self::IpoPricing => "ipo_pricing",
            Self::IpoExpiry => "ipo_expiry",
            Self::Vesting => "vesting",
        }
    }

    pub fn run(self, exchange: &Exchange) -> TickReport {
        match self {
            Self::IpoPricing => exchange.tick_ipo_pricing(),
            Self::IpoExpiry => exchange.tick_ipo_expiry(),
            Self::Vesting => exchange.tick_vesting(),
        }
    }
}

fn interval(period: std::time::Duration) -> Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Run one pass of `tick` off the async workers and log its outcome.
pub async fn run_pass(exchange: Arc<Exchange>, tick: Tick) -> Option<TickReport> {
    match tokio::task::spawn_blocking(move || tick.run(&exchange)).await {
        Ok(report) => {
            log_report(tick, &report);
            Some(report)
        }
        Err(err) => {
            error!(tick = tick.name(), %err, "tick pass aborted");
            None
        }
    }
}

fn log_report(tick: Tick, report: &TickReport) {
    if !report.is_clean() {
        warn!(
            tick = tick.name(),
            visited = report.visited,
            changed = report.changed,
            failed = report.failed.len(),
            "tick pass finished with failures"
        );
    } else if report.changed > 0 {
        info!(tick = tick.name(), visited = report.visited, changed = report.changed, "tick pass");
    } else {
        debug!(tick = tick.name(), visited = report.visited, "tick pass, nothing to do");
    }
}

/// Drive all three ticks on their cadences. Runs until the task is
/// dropped or aborted.
pub async fn drive(exchange: Arc<Exchange>, cadence: TickCadence) {
    let mut pricing = interval(cadence.ipo_pricing());
    let mut expiry = interval(cadence.ipo_expiry());
    let mut vesting = interval(cadence.vesting());
    info!(
        ipo_pricing_secs = cadence.ipo_pricing_secs,
        ipo_expiry_secs = cadence.ipo_expiry_secs,
        vesting_secs = cadence.vesting_secs,
        "tick driver started"
    );
    loop {
        let tick = tokio::select! {
            _ = pricing.tick() => Tick::IpoPricing,
            _ = expiry.tick() => Tick::IpoExpiry,
            _ = vesting.tick() => Tick::Vesting,
        };
        run_pass(Arc::clone(&exchange), tick).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bourse_types::{EngineConfig, InstrumentStatus};

    use super::*;

    #[tokio::test]
    async fn passes_over_an_empty_exchange_are_clean() {
        let exchange = Arc::new(Exchange::in_memory(EngineConfig::default()).unwrap());
        for tick in [Tick::IpoPricing, Tick::IpoExpiry, Tick::Vesting] {
            let report = run_pass(Arc::clone(&exchange), tick).await.unwrap();
            assert_eq!(report, TickReport::default());
        }
    }

    #[tokio::test]
    async fn vesting_pass_visits_new_listing() {
        let exchange = Arc::new(Exchange::in_memory(EngineConfig::default()).unwrap());
        let creator = exchange.open_account("creator").unwrap();
        let listed = exchange.submit_instrument(creator.id, "ACME", "Acme").unwrap();
        assert_eq!(listed.status(), InstrumentStatus::IpoActive);

        let report = run_pass(Arc::clone(&exchange), Tick::Vesting).await.unwrap();
        assert_eq!((report.visited, report.changed), (1, 0));
        // Auction still running on the system clock.
        let report = run_pass(exchange, Tick::IpoExpiry).await.unwrap();
        assert_eq!(report.changed, 0);
    }

    #[test]
    fn tick_names_are_stable() {
        assert_eq!(Tick::IpoPricing.name(), "ipo_pricing");
        assert_eq!(Tick::Vesting.name(), "vesting");
    }
}
