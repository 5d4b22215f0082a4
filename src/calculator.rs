//! Prorated cost of a constant power draw over an arbitrary interval

use crate::logging::get_logger;
use crate::prices::PriceMap;
use crate::time::truncate_to_hour;
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;

/// Watt-seconds per kWh
const WATT_SECONDS_PER_KWH: i64 = 3_600_000;

/// Computes consumption cost over an hourly price series (price per kWh)
#[derive(Debug, Clone, Default)]
pub struct PriceCalculator {
    prices: PriceMap,
}

impl PriceCalculator {
    pub fn new(prices: PriceMap) -> Self {
        Self { prices }
    }

    /// Cost of drawing `watts` from `start` to `end`.
    ///
    /// Returns zero for an empty or inverted interval, and zero when any hour
    /// touched by the interval has no price: a partial sum would understate
    /// the cost.
    pub fn calculate_price(&self, start: DateTime<Utc>, end: DateTime<Utc>, watts: Decimal) -> Decimal {
        if start >= end {
            return Decimal::ZERO;
        }

        // Accumulate price x watt-seconds and scale once at the end
        let mut numerator = Decimal::ZERO;
        let mut bucket = truncate_to_hour(start);
        while bucket < end {
            let bucket_end = bucket + TimeDelta::hours(1);
            let Some(price) = self.prices.get(&bucket) else {
                get_logger("calculator").warn(&format!("Price missing at {}", bucket));
                return Decimal::ZERO;
            };
            let seconds = (end.min(bucket_end) - start.max(bucket)).num_seconds();
            numerator += *price * watts * Decimal::from(seconds);
            bucket = bucket_end;
        }

        numerator / Decimal::from(WATT_SECONDS_PER_KWH)
    }
}

/// Convenience wrapper over [`PriceCalculator::calculate_price`]
pub fn calculate_cost(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    watts: Decimal,
    prices: &PriceMap,
) -> Decimal {
    PriceCalculator::new(prices.clone()).calculate_price(start, end, watts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn totals() -> PriceMap {
        PriceMap::from([
            (utc("2023-02-04T15:00:00Z"), dec("1.708765039")),
            (utc("2023-02-04T16:00:00Z"), dec("2.443870054")),
        ])
    }

    #[test]
    fn test_partial_hours() {
        let calc = PriceCalculator::new(totals());
        let cost = calc.calculate_price(
            utc("2023-02-04T15:30:00Z"),
            utc("2023-02-04T16:30:00Z"),
            Decimal::from(150),
        );
        assert_eq!(cost, dec("0.311447631975"));
    }

    #[test]
    fn test_full_hours() {
        let calc = PriceCalculator::new(totals());
        let cost = calc.calculate_price(
            utc("2023-02-04T15:00:00Z"),
            utc("2023-02-04T17:00:00Z"),
            Decimal::from(1000),
        );
        assert_eq!(cost, dec("4.152635093"));
    }

    #[test]
    fn test_linearity() {
        let map = totals();
        let start = utc("2023-02-04T15:15:00Z");
        let end = utc("2023-02-04T16:45:00Z");
        let single = calculate_cost(start, end, Decimal::from(333), &map);
        let double = calculate_cost(start, end, Decimal::from(666), &map);
        assert_eq!(double, single * Decimal::TWO);
    }

    #[test]
    fn test_missing_hour_returns_zero() {
        let calc = PriceCalculator::new(totals());
        let cost = calc.calculate_price(
            utc("2023-02-04T14:30:00Z"),
            utc("2023-02-04T15:30:00Z"),
            Decimal::from(150),
        );
        assert_eq!(cost, Decimal::ZERO);

        let tail = calc.calculate_price(
            utc("2023-02-04T16:30:00Z"),
            utc("2023-02-04T17:00:01Z"),
            Decimal::from(150),
        );
        assert_eq!(tail, Decimal::ZERO);
    }

    #[test]
    fn test_degenerate_window_returns_zero() {
        let calc = PriceCalculator::new(totals());
        let at = utc("2023-02-04T15:30:00Z");
        assert_eq!(calc.calculate_price(at, at, Decimal::from(150)), Decimal::ZERO);
        assert_eq!(
            calc.calculate_price(at, at - TimeDelta::minutes(5), Decimal::from(150)),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_end_on_hour_boundary_does_not_touch_next_hour() {
        let calc = PriceCalculator::new(totals());
        let cost = calc.calculate_price(
            utc("2023-02-04T16:00:00Z"),
            utc("2023-02-04T17:00:00Z"),
            Decimal::from(1000),
        );
        assert_eq!(cost, dec("2.443870054"));
    }
}
