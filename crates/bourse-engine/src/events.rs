//! Notification sinks.
//!
//! The engine hands every committed transaction's events to an
//! [`EventSink`]. Sinks must not block and must not fail the caller;
//! delivery is best effort.

use std::sync::{Mutex, PoisonError};

use bourse_types::MarketEvent;

/// Receiver of committed market events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MarketEvent);
}

/// Drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: MarketEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MarketEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MarketEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<MarketEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: MarketEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
