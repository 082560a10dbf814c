//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock, Weak};

use bourse_engine::{EventSink, Exchange, RecordingSink};
use bourse_store::MemoryStore;
use bourse_types::{
    Account, EngineConfig, Instrument, InstrumentStatus, ManualClock, MarketEvent, MatchAtomicity,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

pub struct Harness {
    pub exchange: Exchange,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<RecordingSink>,
    pub start: DateTime<Utc>,
}

pub fn harness(config: EngineConfig) -> Harness {
    let start = Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let sink = Arc::new(RecordingSink::new());
    let store = Arc::new(MemoryStore::new(config.retry.clone()));
    let exchange = Exchange::new(config, store, clock.clone(), sink.clone()).unwrap();
    Harness {
        exchange,
        clock,
        sink,
        start,
    }
}

/// Default config with row-lock waits long enough for thread tests.
pub fn patient_config(atomicity: MatchAtomicity) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.match_atomicity = atomicity;
    config.retry.lock_wait_ms = 5_000;
    config.retry.max_attempts = 5;
    config
}

/// Row-lock waits short enough that a held row fails a tick quickly.
pub fn impatient_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.lock_wait_ms = 20;
    config.retry.max_attempts = 2;
    config.retry.backoff_ms = 1;
    config
}

type React = Box<dyn Fn(&Exchange, &MarketEvent) + Send + Sync>;

/// Hands every event to `react` with the exchange, so a test can act
/// between two commits of one operation.
pub struct Listener {
    exchange: OnceLock<Weak<Exchange>>,
    react: React,
}

impl EventSink for Listener {
    fn emit(&self, event: MarketEvent) {
        if let Some(exchange) = self.exchange.get().and_then(Weak::upgrade) {
            (self.react)(&exchange, &event);
        }
    }
}

/// An exchange whose committed events reach `react`.
pub fn listening_exchange<F>(config: EngineConfig, react: F) -> (Arc<Exchange>, Arc<ManualClock>)
where
    F: Fn(&Exchange, &MarketEvent) + Send + Sync + 'static,
{
    let start = Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let listener = Arc::new(Listener {
        exchange: OnceLock::new(),
        react: Box::new(react),
    });
    let store = Arc::new(MemoryStore::new(config.retry.clone()));
    let exchange = Arc::new(Exchange::new(config, store, clock.clone(), listener.clone()).unwrap());
    listener.exchange.set(Arc::downgrade(&exchange)).unwrap();
    (exchange, clock)
}

/// Two-decimal amount: `d(1050)` is 10.50.
pub fn d(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub struct Market {
    pub h: Harness,
    pub creator: Account,
    pub alice: Account,
    pub bob: Account,
    pub instrument: Instrument,
}

/// An instrument whose auction succeeded.
///
/// Alice bought 400 and Bob 100 shares at 2.00; the window has closed
/// and the expiry tick moved the instrument to TRADING. Alice holds
/// 196.00, Bob 799.00.
pub fn trading_market(config: EngineConfig) -> Market {
    let h = harness(config);
    let ex = &h.exchange;
    let creator = ex.open_account("creator").unwrap();
    let alice = ex.open_account("alice").unwrap();
    let bob = ex.open_account("bob").unwrap();
    let instrument = ex.submit_instrument(creator.id, "ACME", "Acme Corp").unwrap();

    ex.buy_ipo(alice.id, instrument.id, 400).unwrap();
    ex.buy_ipo(bob.id, instrument.id, 100).unwrap();
    h.clock.advance(Duration::hours(25));
    let report = ex.tick_ipo_expiry();
    assert!(report.is_clean());
    assert_eq!(
        ex.get_instrument(instrument.id).unwrap().status(),
        InstrumentStatus::Trading
    );
    h.sink.take();

    Market {
        h,
        creator,
        alice,
        bob,
        instrument,
    }
}
