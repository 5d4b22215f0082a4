//! Shared price surface used by the refresh cycle and ad-hoc queries

use crate::cache::TimeSeriesCache;
use crate::config::Config;
use crate::error::Result;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::normalizer::PriceListNormalizer;
use crate::prices::{Currency, FuturePrice, PriceComponent, PriceMap, vat_factor};
use crate::source::{
    DateAnchor, DateOffset, DateQueryParameter, GlobalLocationNumber, PriceSource, SpotPriceQuery, TariffFilter,
    TariffQuery, default_filter, spot_prices_per_kwh,
};
use crate::time::{Clock, DATAHUB_ZONE, truncate_to_hour};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Cache, source and normalizer behind one thread-safe surface
pub struct PriceService {
    config: Config,
    source: Arc<dyn PriceSource>,
    cache: TimeSeriesCache,
    normalizer: PriceListNormalizer,
    clock: Arc<dyn Clock>,
    logger: StructuredLogger,
}

impl PriceService {
    pub fn new(config: Config, source: Arc<dyn PriceSource>, clock: Arc<dyn Clock>) -> Self {
        let cache = TimeSeriesCache::new(clock.clone(), (&config.cache).into());
        let logger = get_logger_with_context(
            LogContext::new("service").with_price_area(&config.service.price_area),
        );
        Self {
            config,
            source,
            cache,
            normalizer: PriceListNormalizer::new(DATAHUB_ZONE),
            clock,
            logger,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &TimeSeriesCache {
        &self.cache
    }

    pub fn source(&self) -> &Arc<dyn PriceSource> {
        &self.source
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn currency(&self) -> Currency {
        self.config.service.currency
    }

    /// GLN of the party publishing `component`
    pub fn charge_owner(&self, component: PriceComponent) -> GlobalLocationNumber {
        match component {
            PriceComponent::NetTariff => GlobalLocationNumber::new(&self.config.service.grid_company_gln),
            _ => GlobalLocationNumber::new(&self.config.service.energinet_gln),
        }
    }

    /// Request for a tariff component; `None` for the spot price or when no
    /// charge owner is configured
    pub fn tariff_query(&self, component: PriceComponent) -> Option<TariffQuery> {
        let gln = self.charge_owner(component);
        if gln.is_empty() {
            return None;
        }
        let default = default_filter(component, &GlobalLocationNumber::new(&self.config.service.grid_company_gln))?;
        let filter = match component {
            PriceComponent::NetTariff => {
                TariffFilter::resolve(&default, self.config.service.net_tariff_filter.as_ref())
            }
            _ => default,
        };
        Some(TariffQuery { gln, filter })
    }

    /// Spot prices are requested with historic depth only when that depth
    /// is retained and not yet cached
    fn wants_historic_spot(&self) -> bool {
        self.cache.settings().keep_historic_spot
            && !self.cache.has_historic_coverage(PriceComponent::SpotPrice)
    }

    pub fn spot_query(&self) -> SpotPriceQuery {
        let start = if self.wants_historic_spot() {
            DateQueryParameter::with_offset(
                DateAnchor::UtcNow,
                DateOffset::Hours(-i64::from(self.cache.settings().historic_hours)),
            )
        } else {
            DateQueryParameter::anchor(DateAnchor::UtcNow)
        };
        SpotPriceQuery {
            price_area: self.config.service.price_area.clone(),
            currency: self.currency(),
            start,
        }
    }

    /// Whether the cached series lacks data through the end of tomorrow
    pub fn needs_download(&self, component: PriceComponent) -> bool {
        if component == PriceComponent::SpotPrice && self.wants_historic_spot() {
            return true;
        }
        !self.cache.is_covered_through_tomorrow(component)
    }

    /// Fetch `component` and replace its cached series. Returns the number
    /// of records received.
    pub async fn download(&self, component: PriceComponent) -> Result<usize> {
        match component {
            PriceComponent::SpotPrice => self.download_spot_prices().await,
            _ => self.download_tariff(component).await,
        }
    }

    async fn download_spot_prices(&self) -> Result<usize> {
        let historic = self.wants_historic_spot();
        let query = self.spot_query();
        let records = self.source.fetch_spot_prices(&query).await?;
        let mut series = spot_prices_per_kwh(&records, query.currency);

        // A forward-only fetch keeps the historic window already cached
        if self.cache.settings().keep_historic_spot && !historic {
            let current_hour = truncate_to_hour(self.now());
            let mut merged: PriceMap = self
                .cache
                .get(PriceComponent::SpotPrice)
                .into_iter()
                .filter(|(hour, _)| *hour < current_hour)
                .collect();
            merged.append(&mut series);
            series = merged;
        }

        self.logger.debug(&format!(
            "Received {} spot price records ({})",
            records.len(),
            query.start
        ));
        self.cache.put(PriceComponent::SpotPrice, series);
        Ok(records.len())
    }

    async fn download_tariff(&self, component: PriceComponent) -> Result<usize> {
        let Some(query) = self.tariff_query(component) else {
            self.logger
                .debug(&format!("No charge owner configured for {}, skipping", component));
            return Ok(0);
        };

        let now = self.now();
        let local_hour_start = truncate_to_hour(now)
            .with_timezone(&self.normalizer.zone())
            .naive_local();
        let records: Vec<_> = self
            .source
            .fetch_tariffs(&query)
            .await?
            .into_iter()
            .filter(|r| r.is_valid_at_or_after(local_hour_start))
            .collect();

        let hourly = self.normalizer.to_hourly(&records, now);
        self.logger.debug(&format!(
            "Received {} {} records covering {} hours",
            records.len(),
            component,
            hourly.len()
        ));
        self.cache.put(component, hourly);
        Ok(records.len())
    }

    /// Cached series of `component`, downloading it once inline when empty.
    /// Download failures are logged and yield whatever is cached.
    pub async fn prices(&self, component: PriceComponent) -> PriceMap {
        if self.cache.is_empty(component) {
            match self.download(component).await {
                Ok(_) => self.cache.cleanup(),
                Err(e) => self
                    .logger
                    .warn(&format!("Error retrieving {}: {}", component, e)),
            }
        }
        self.cache.get(component)
    }

    /// Current-hour value, VAT-adjusted when configured for the component
    pub fn current_value(&self, component: PriceComponent) -> Option<Decimal> {
        let value = self.cache.current(component)?;
        if self.config.vat.include_vat.contains(&component) {
            Some(value * vat_factor(&self.config.vat.country))
        } else {
            Some(value)
        }
    }

    /// Future price curve over the cached spot hours; tariffs are `None`
    /// where not cached. VAT is never applied here.
    pub fn future_prices(&self) -> Vec<FuturePrice> {
        let tariffs: Vec<(PriceComponent, PriceMap)> = PriceComponent::ALL
            .into_iter()
            .filter(|c| c.is_tariff())
            .map(|c| (c, self.cache.get(c)))
            .collect();

        self.cache
            .get(PriceComponent::SpotPrice)
            .into_iter()
            .map(|(hour, spot)| {
                let mut price = FuturePrice::new(hour, spot, self.currency());
                for (component, series) in &tariffs {
                    price.set(*component, series.get(&hour).copied());
                }
                price
            })
            .collect()
    }

    pub fn future_prices_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.future_prices())?)
    }
}

impl std::fmt::Debug for PriceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceService")
            .field("price_area", &self.config.service.price_area)
            .field("currency", &self.config.service.currency)
            .finish_non_exhaustive()
    }
}
