//! Conversion of tariff price lists into hourly series
//!
//! Datahub publishes a tariff as a validity interval in local time plus up to
//! 24 per-hour values. Value `i` applies to local hour `i` of each day in the
//! interval. The normalizer expands such records into UTC hour starts.

use crate::prices::PriceMap;
use crate::time::{end_of_tomorrow, local_midnight, local_to_utc, truncate_to_hour};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

/// Raw tariff record as published upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffRecord {
    /// Start of validity, local time in the governing zone
    pub valid_from: NaiveDateTime,
    /// End of validity (exclusive), `None` when open-ended
    pub valid_to: Option<NaiveDateTime>,
    pub charge_type_code: String,
    /// Per-hour values; trailing unpublished hours are trimmed
    pub prices: Vec<Option<Decimal>>,
}

impl TariffRecord {
    pub fn new(
        valid_from: NaiveDateTime,
        valid_to: Option<NaiveDateTime>,
        charge_type_code: impl Into<String>,
        mut prices: Vec<Option<Decimal>>,
    ) -> Self {
        while prices.last().is_some_and(Option::is_none) {
            prices.pop();
        }
        Self {
            valid_from,
            valid_to,
            charge_type_code: charge_type_code.into(),
            prices,
        }
    }

    /// A record publishing only its first value applies that value to every hour
    pub fn is_flat_rate(&self) -> bool {
        self.prices.len() == 1
    }

    /// Whether the record is still valid at or after `local`
    pub fn is_valid_at_or_after(&self, local: NaiveDateTime) -> bool {
        self.valid_to.is_none_or(|to| to > local)
    }

    fn value_for(&self, index: usize) -> Option<Decimal> {
        if self.is_flat_rate() {
            return self.prices.first().copied().flatten();
        }
        self.prices.get(index).copied().flatten()
    }
}

/// Expands tariff records into hour-start keyed series
#[derive(Debug, Clone, Copy)]
pub struct PriceListNormalizer {
    zone: Tz,
}

impl PriceListNormalizer {
    pub const fn new(zone: Tz) -> Self {
        Self { zone }
    }

    pub const fn zone(&self) -> Tz {
        self.zone
    }

    /// Normalize `records` over the window from the current hour to the end
    /// of tomorrow in the governing zone
    pub fn to_hourly(&self, records: &[TariffRecord], now: DateTime<Utc>) -> PriceMap {
        self.to_hourly_between(records, truncate_to_hour(now), end_of_tomorrow(now, self.zone))
    }

    /// Normalize `records` within `[from, to)`.
    ///
    /// Records are applied in order and a later record replaces values of an
    /// earlier one for the same hour. Hours past the last published value of
    /// a day (23- or 25-hour days) are not emitted.
    pub fn to_hourly_between(
        &self,
        records: &[TariffRecord],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PriceMap {
        let mut hourly = PriceMap::new();
        for record in records {
            if record.prices.is_empty() {
                continue;
            }
            let valid_from = local_to_utc(record.valid_from, self.zone);
            let valid_to = record
                .valid_to
                .map_or(to, |t| local_to_utc(t, self.zone));

            let mut hour = truncate_to_hour(valid_from.max(from));
            if hour < valid_from {
                hour += TimeDelta::hours(1);
            }
            let end = valid_to.min(to);
            while hour < end {
                if let Some(value) = record.value_for(self.hour_index(hour, valid_from)) {
                    hourly.insert(hour, value);
                }
                hour += TimeDelta::hours(1);
            }
        }
        hourly
    }

    /// Index of `hour` within its local day, counted from the later of local
    /// midnight and the start of validity. A record starting mid-day applies
    /// its first value at `valid_from`; following days restart at midnight.
    fn hour_index(&self, hour: DateTime<Utc>, valid_from: DateTime<Utc>) -> usize {
        let local_date = hour.with_timezone(&self.zone).date_naive();
        let day_start = local_midnight(local_date, self.zone).max(valid_from);
        usize::try_from((hour - day_start).num_hours()).unwrap_or(0)
    }
}
