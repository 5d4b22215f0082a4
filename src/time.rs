//! Clock abstraction and hour/day arithmetic
//!
//! All cached price data is keyed by UTC hour starts, while publication and
//! tariff validity follow local wall-clock time in a governing zone. The
//! helpers here convert between the two.

use crate::error::{ElspotError, Result};
use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::RwLock;

/// Zone governing Datahub tariff validity intervals
pub const DATAHUB_ZONE: Tz = chrono_tz::CET;

/// Zone governing Nord Pool spot price publication
pub const NORD_POOL_ZONE: Tz = chrono_tz::CET;

/// Format used for human-readable service properties such as `nextCall`
pub const PROPERTY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the current instant
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Move the clock to an absolute instant
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self
            .now
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = now;
    }

    /// Move the clock forward
    pub fn advance(&self, delta: TimeDelta) {
        let mut guard = self
            .now
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .now
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Start of the UTC clock hour containing `t`
pub fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0).unwrap_or(t)
}

/// Start of the clock hour following the one containing `t`
pub fn next_hour_boundary(t: DateTime<Utc>) -> DateTime<Utc> {
    truncate_to_hour(t) + TimeDelta::hours(1)
}

/// Resolve a local wall-clock time in `zone` to a UTC instant.
///
/// Ambiguous times (autumn fold) resolve to the earlier instant. Times that
/// do not exist (spring gap) are moved forward past the gap.
pub fn local_to_utc(local: NaiveDateTime, zone: Tz) -> DateTime<Utc> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = local + TimeDelta::hours(1);
            zone.from_local_datetime(&shifted)
                .earliest()
                .map_or_else(|| shifted.and_utc(), |t| t.with_timezone(&Utc))
        }
    }
}

/// UTC instant of local midnight starting `date` in `zone`
pub fn local_midnight(date: NaiveDate, zone: Tz) -> DateTime<Utc> {
    local_to_utc(date.and_time(NaiveTime::MIN), zone)
}

/// UTC instant of the local midnight that ends the next local calendar day
pub fn end_of_tomorrow(now: DateTime<Utc>, zone: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&zone).date_naive();
    let day_after = today.checked_add_days(Days::new(2)).unwrap_or(today);
    local_midnight(day_after, zone)
}

/// Next instant strictly after `now` at which the local time of day in `zone`
/// equals `time`
pub fn next_local_time(now: DateTime<Utc>, time: NaiveTime, zone: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&zone).date_naive();
    let candidate = local_to_utc(today.and_time(time), zone);
    if candidate > now {
        return candidate;
    }
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    local_to_utc(tomorrow.and_time(time), zone)
}

/// Time remaining until the next occurrence of `time` in `zone`
pub fn until_next_local_time(now: DateTime<Utc>, time: NaiveTime, zone: Tz) -> TimeDelta {
    next_local_time(now, time, zone) - now
}

/// Whether the local time of day in `zone` has reached `time` today
pub fn is_at_or_after_local_time(now: DateTime<Utc>, time: NaiveTime, zone: Tz) -> bool {
    now.with_timezone(&zone).time() >= time
}

/// Convert a non-negative chrono delta to a std duration, clamping negatives to zero
pub fn to_std(delta: TimeDelta) -> std::time::Duration {
    delta.to_std().unwrap_or(std::time::Duration::ZERO)
}

/// Parse an `HH:MM` or `HH:MM:SS` time of day
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| ElspotError::validation("time_of_day", format!("'{}': {}", value, e)))
}

/// Parse an IANA time zone name
pub fn parse_zone(value: &str) -> Result<Tz> {
    value
        .parse::<Tz>()
        .map_err(|e| ElspotError::validation("timezone", format!("'{}': {}", value, e)))
}
