//! Ad-hoc price queries
//!
//! These are synchronous-style conveniences for callers outside the refresh
//! cycle. Each selected component is read through
//! [`PriceService::prices`], which downloads a missing series once inline
//! without touching the orchestrator's retry state.

use crate::calculator::PriceCalculator;
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::orchestrator::PriceService;
use crate::prices::{PriceComponent, PriceMap};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Summed price queries and cost calculation
#[derive(Debug, Clone)]
pub struct PriceActions {
    service: Arc<PriceService>,
    logger: StructuredLogger,
}

/// Parse a comma-separated list of price element names
pub fn parse_price_elements(names: &str) -> Result<BTreeSet<PriceComponent>> {
    names.split(',').map(PriceComponent::parse).collect()
}

/// Add every value of `source` onto `destination`, hour by hour
fn merge_into(destination: &mut PriceMap, source: PriceMap) {
    for (hour, value) in source {
        *destination.entry(hour).or_insert(Decimal::ZERO) += value;
    }
}

impl PriceActions {
    pub fn new(service: Arc<PriceService>) -> Self {
        Self {
            service,
            logger: get_logger("actions"),
        }
    }

    /// Sum of all price components per hour
    pub async fn get_all_prices(&self) -> PriceMap {
        self.get_prices_for(&PriceComponent::ALL.into_iter().collect())
            .await
    }

    /// Sum of the named price components per hour. A blank list selects all
    /// components; an unknown name yields an empty result.
    pub async fn get_prices(&self, price_elements: &str) -> PriceMap {
        if price_elements.trim().is_empty() {
            return self.get_all_prices().await;
        }
        match parse_price_elements(price_elements) {
            Ok(components) => self.get_prices_for(&components).await,
            Err(e) => {
                self.logger.warn(&e.to_string());
                PriceMap::new()
            }
        }
    }

    /// Sum of the selected components per hour.
    ///
    /// Tariffs are only published in the primary currency, so summing them
    /// with a spot price in another currency yields an empty result.
    pub async fn get_prices_for(&self, components: &BTreeSet<PriceComponent>) -> PriceMap {
        let currency = self.service.currency();
        if components.contains(&PriceComponent::SpotPrice)
            && components.len() > 1
            && !currency.is_primary()
        {
            self.logger.warn(&format!(
                "Cannot calculate sum when spot price currency is {}",
                currency
            ));
            return PriceMap::new();
        }

        let mut prices = PriceMap::new();
        for component in components {
            merge_into(&mut prices, self.service.prices(*component).await);
        }
        prices
    }

    /// Cost of drawing `watts` from `start` to `end` at the summed hourly price
    pub async fn calculate_price(&self, start: DateTime<Utc>, end: DateTime<Utc>, watts: Decimal) -> Decimal {
        PriceCalculator::new(self.get_all_prices().await).calculate_price(start, end, watts)
    }
}
