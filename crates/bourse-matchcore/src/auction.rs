//! Dutch-auction price curve.
//!
//! ```text
//! price(t) = max(end, start - (start - end) * min(t / duration, 1))
//! ```
//!
//! Linear, monotonic non-increasing, clamped at `end` once the window
//! has passed. Evaluated at second resolution and rounded to
//! `PRICE_PRECISION` decimal places.

use bourse_types::{Instrument, IpoTerms, constants};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Auction price `elapsed_secs` seconds into the window.
///
/// Negative elapsed time (clock skew) is treated as zero.
#[must_use]
pub fn auction_price(terms: &IpoTerms, elapsed_secs: i64) -> Decimal {
    let duration_secs = i64::from(terms.duration_hours) * constants::SECONDS_PER_HOUR;
    let progress = if duration_secs <= 0 {
        Decimal::ONE
    } else {
        (Decimal::from(elapsed_secs.max(0)) / Decimal::from(duration_secs)).min(Decimal::ONE)
    };
    let raw = terms.start_price - (terms.start_price - terms.end_price) * progress;
    raw.max(terms.end_price)
        .round_dp_with_strategy(constants::PRICE_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

/// Current auction price of `instrument` at wall-clock `now`.
#[must_use]
pub fn price_at(instrument: &Instrument, now: DateTime<Utc>) -> Decimal {
    let elapsed = (now - instrument.ipo_started_at).num_seconds();
    auction_price(&instrument.ipo, elapsed)
}

#[cfg(test)]
mod tests {
    use bourse_types::{InstrumentStatus, IpoConfig};
    use chrono::Duration;

    use super::*;

    const HOUR: i64 = constants::SECONDS_PER_HOUR;

    fn terms() -> IpoTerms {
        IpoTerms::from(&IpoConfig::default())
    }

    #[test]
    fn curve_reference_points() {
        let t = terms();
        assert_eq!(auction_price(&t, 0), Decimal::new(200, 2));
        assert_eq!(auction_price(&t, 12 * HOUR), Decimal::new(105, 2));
        assert_eq!(auction_price(&t, 24 * HOUR), Decimal::new(10, 2));
        assert_eq!(auction_price(&t, 30 * HOUR), Decimal::new(10, 2));
    }

    #[test]
    fn negative_elapsed_is_start_price() {
        assert_eq!(auction_price(&terms(), -HOUR), Decimal::new(200, 2));
    }

    #[test]
    fn curve_is_monotonic() {
        let t = terms();
        let mut last = auction_price(&t, 0);
        for secs in (0..=30 * HOUR).step_by(97) {
            let p = auction_price(&t, secs);
            assert!(p <= last, "price rose at {secs}s: {last} -> {p}");
            assert!(p >= t.end_price);
            last = p;
        }
    }

    #[test]
    fn price_at_uses_wall_clock() {
        let instrument = Instrument::dummy(InstrumentStatus::IpoActive);
        let now = instrument.ipo_started_at + Duration::hours(12);
        assert_eq!(price_at(&instrument, now), Decimal::new(105, 2));
    }
}
