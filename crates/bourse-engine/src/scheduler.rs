//! Tick bookkeeping shared by the periodic entry points.
//!
//! Every tick walks instruments one at a time. Each instrument's work
//! runs in its own transaction(s); a failure is logged and recorded in
//! the [`TickReport`] and the walk continues with the next instrument.

use bourse_types::{BourseError, InstrumentId, Result};
use serde::Serialize;
use tracing::warn;

/// Outcome of one pass of a periodic tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Instruments visited.
    pub visited: usize,
    /// Instruments whose state changed.
    pub changed: usize,
    /// Instruments whose processing failed, with the error message.
    pub failed: Vec<(InstrumentId, String)>,
}

impl TickReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Record the result of processing one instrument.
    pub(crate) fn record(&mut self, tick: &str, instrument: InstrumentId, result: Result<bool>) {
        self.visited += 1;
        match result {
            Ok(true) => self.changed += 1,
            Ok(false) => {}
            Err(err) => self.fail(tick, instrument, &err),
        }
    }

    pub(crate) fn fail(&mut self, tick: &str, instrument: InstrumentId, err: &BourseError) {
        warn!(tick, instrument = %instrument, error = %err, "instrument skipped this tick");
        self.failed.push((instrument, err.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_do_not_count_as_changes() {
        let mut report = TickReport::default();
        report.record("t", InstrumentId::new(), Ok(true));
        report.record("t", InstrumentId::new(), Ok(false));
        report.record("t", InstrumentId::new(), Err(BourseError::Internal("boom".into())));
        assert_eq!(report.visited, 3);
        assert_eq!(report.changed, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_clean());
    }
}
