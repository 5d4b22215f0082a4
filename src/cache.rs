//! In-memory hourly price cache
//!
//! Each component owns an independent series guarded by its own lock. A
//! series is stored behind an `Arc`, so writers swap in a complete new map
//! and readers only hold the lock long enough to clone the pointer.

use crate::prices::{PriceComponent, PriceMap};
use crate::time::{Clock, end_of_tomorrow, truncate_to_hour};
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, PoisonError, RwLock};

/// Cache retention settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Depth in hours of the historic window checked by
    /// [`TimeSeriesCache::has_historic_coverage`]
    pub historic_hours: u32,
    /// Keep that historic window of spot prices through cleanup
    pub keep_historic_spot: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            historic_hours: 24,
            keep_historic_spot: false,
        }
    }
}

type Series = RwLock<Arc<PriceMap>>;

/// Per-component hourly series with coverage queries and time-based eviction
#[derive(Debug)]
pub struct TimeSeriesCache {
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    series: [Series; PriceComponent::ALL.len()],
}

impl TimeSeriesCache {
    pub fn new(clock: Arc<dyn Clock>, settings: CacheSettings) -> Self {
        Self {
            clock,
            settings,
            series: std::array::from_fn(|_| RwLock::new(Arc::new(PriceMap::new()))),
        }
    }

    fn slot(&self, component: PriceComponent) -> &Series {
        &self.series[component.index()]
    }

    fn snapshot(&self, component: PriceComponent) -> Arc<PriceMap> {
        self.slot(component)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the whole series of `component`. An empty map clears it.
    pub fn put(&self, component: PriceComponent, values: PriceMap) {
        let mut guard = self
            .slot(component)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(values);
    }

    /// Copy of the current series; empty if nothing is cached
    pub fn get(&self, component: PriceComponent) -> PriceMap {
        self.snapshot(component).as_ref().clone()
    }

    pub fn is_empty(&self, component: PriceComponent) -> bool {
        self.snapshot(component).is_empty()
    }

    /// Value for the hour containing `at`
    pub fn value_at(&self, component: PriceComponent, at: DateTime<Utc>) -> Option<Decimal> {
        self.snapshot(component)
            .get(&truncate_to_hour(at))
            .copied()
    }

    /// Value for the current clock hour
    pub fn current(&self, component: PriceComponent) -> Option<Decimal> {
        self.value_at(component, self.clock.now())
    }

    /// Number of cached hours from the current hour onwards
    pub fn lookahead_hours(&self, component: PriceComponent) -> usize {
        let current_hour = truncate_to_hour(self.clock.now());
        self.snapshot(component).range(current_hour..).count()
    }

    /// True iff every clock hour from the current hour until the end of the
    /// next local calendar day in the component's zone has an entry
    pub fn is_covered_through_tomorrow(&self, component: PriceComponent) -> bool {
        let now = self.clock.now();
        let start = truncate_to_hour(now);
        let end = end_of_tomorrow(now, component.zone());
        let expected = usize::try_from((end - start).num_hours()).unwrap_or(0);
        let series = self.snapshot(component);
        series.range(start..end).count() == expected
    }

    /// True iff the earliest stored hour reaches back at least
    /// `historic_hours` before the current hour
    pub fn has_historic_coverage(&self, component: PriceComponent) -> bool {
        let boundary = truncate_to_hour(self.clock.now())
            - TimeDelta::hours(i64::from(self.settings.historic_hours));
        self.snapshot(component)
            .keys()
            .next()
            .is_some_and(|earliest| *earliest <= boundary)
    }

    fn retention_cutoff(&self, component: PriceComponent, current_hour: DateTime<Utc>) -> DateTime<Utc> {
        if component == PriceComponent::SpotPrice && self.settings.keep_historic_spot {
            current_hour - TimeDelta::hours(i64::from(self.settings.historic_hours))
        } else {
            current_hour
        }
    }

    /// Remove every entry whose hour start precedes the current clock hour
    pub fn cleanup(&self) {
        let current_hour = truncate_to_hour(self.clock.now());
        for component in PriceComponent::ALL {
            let cutoff = self.retention_cutoff(component, current_hour);
            let mut guard = self
                .slot(component)
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if guard.keys().next().is_some_and(|first| *first < cutoff) {
                Arc::make_mut(&mut *guard).retain(|hour, _| *hour >= cutoff);
            }
        }
    }

    /// Drop every series
    pub fn clear(&self) {
        for component in PriceComponent::ALL {
            self.put(component, PriceMap::new());
        }
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn hourly(from: &str, hours: i64, value: i64) -> PriceMap {
        let start = utc(from);
        (0..hours)
            .map(|h| (start + TimeDelta::hours(h), Decimal::new(value, 3)))
            .collect()
    }

    fn cache_at(now: &str) -> (Arc<FixedClock>, TimeSeriesCache) {
        let clock = Arc::new(FixedClock::new(utc(now)));
        let cache = TimeSeriesCache::new(clock.clone(), CacheSettings::default());
        (clock, cache)
    }

    #[test]
    fn test_put_replaces_and_get_snapshots() {
        let (_clock, cache) = cache_at("2023-02-04T12:10:00Z");
        cache.put(PriceComponent::SystemTariff, hourly("2023-02-04T12:00:00Z", 3, 54));
        let snapshot = cache.get(PriceComponent::SystemTariff);
        cache.put(PriceComponent::SystemTariff, hourly("2023-02-04T20:00:00Z", 1, 1));

        assert_eq!(snapshot.len(), 3);
        assert_eq!(cache.get(PriceComponent::SystemTariff).len(), 1);
        assert!(cache.get(PriceComponent::NetTariff).is_empty());

        cache.put(PriceComponent::SystemTariff, PriceMap::new());
        assert!(cache.is_empty(PriceComponent::SystemTariff));
    }

    #[test]
    fn test_current_value() {
        let (_clock, cache) = cache_at("2023-02-04T12:59:59Z");
        cache.put(PriceComponent::ElectricityTax, hourly("2023-02-04T12:00:00Z", 1, 8));
        assert_eq!(
            cache.current(PriceComponent::ElectricityTax),
            Some(Decimal::new(8, 3))
        );
        assert_eq!(cache.current(PriceComponent::NetTariff), None);
    }

    #[test]
    fn test_cleanup_removes_only_past_hours_and_is_idempotent() {
        let (clock, cache) = cache_at("2023-02-04T12:00:00Z");
        cache.put(PriceComponent::SpotPrice, hourly("2023-02-04T10:00:00Z", 5, 1));
        cache.put(PriceComponent::NetTariff, hourly("2023-02-04T12:00:00Z", 2, 1));

        cache.cleanup();
        let spot = cache.get(PriceComponent::SpotPrice);
        assert_eq!(spot.len(), 3);
        assert_eq!(spot.keys().next(), Some(&utc("2023-02-04T12:00:00Z")));
        assert_eq!(cache.get(PriceComponent::NetTariff).len(), 2);

        cache.cleanup();
        assert_eq!(cache.get(PriceComponent::SpotPrice).len(), 3);

        clock.set(utc("2023-02-04T13:30:00Z"));
        cache.cleanup();
        assert_eq!(cache.get(PriceComponent::SpotPrice).len(), 2);
        assert_eq!(cache.get(PriceComponent::NetTariff).len(), 1);
    }

    #[test]
    fn test_coverage_through_tomorrow() {
        let (_clock, cache) = cache_at("2023-02-04T12:00:00Z");
        // Until 2023-02-06 00:00 CET, which is 23:00Z on the 5th: 35 hours
        cache.put(PriceComponent::NetTariff, hourly("2023-02-04T12:00:00Z", 35, 1));
        assert!(cache.is_covered_through_tomorrow(PriceComponent::NetTariff));

        let mut gap = hourly("2023-02-04T12:00:00Z", 35, 1);
        gap.remove(&utc("2023-02-05T03:00:00Z"));
        cache.put(PriceComponent::NetTariff, gap);
        assert!(!cache.is_covered_through_tomorrow(PriceComponent::NetTariff));

        cache.put(PriceComponent::NetTariff, hourly("2023-02-04T12:00:00Z", 34, 1));
        assert!(!cache.is_covered_through_tomorrow(PriceComponent::NetTariff));
    }

    #[test]
    fn test_historic_coverage_and_retention() {
        let clock = Arc::new(FixedClock::new(utc("2023-02-04T12:00:00Z")));
        let cache = TimeSeriesCache::new(
            clock.clone(),
            CacheSettings {
                historic_hours: 24,
                keep_historic_spot: true,
            },
        );
        cache.put(PriceComponent::SpotPrice, hourly("2023-02-03T12:00:00Z", 30, 1));
        assert!(cache.has_historic_coverage(PriceComponent::SpotPrice));

        cache.put(PriceComponent::SpotPrice, hourly("2023-02-03T13:00:00Z", 29, 1));
        assert!(!cache.has_historic_coverage(PriceComponent::SpotPrice));

        clock.set(utc("2023-02-04T14:00:00Z"));
        cache.cleanup();
        let spot = cache.get(PriceComponent::SpotPrice);
        assert_eq!(spot.keys().next(), Some(&utc("2023-02-03T14:00:00Z")));
        assert_eq!(cache.lookahead_hours(PriceComponent::SpotPrice), 4);
    }

    #[test]
    fn test_clear() {
        let (_clock, cache) = cache_at("2023-02-04T12:00:00Z");
        for component in PriceComponent::ALL {
            cache.put(component, hourly("2023-02-04T12:00:00Z", 2, 1));
        }
        cache.clear();
        assert!(PriceComponent::ALL.iter().all(|c| cache.is_empty(*c)));
    }
}
