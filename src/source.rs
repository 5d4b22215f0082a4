//! Upstream price data source
//!
//! [`PriceSource`] is the seam between the refresh logic and Energi Data
//! Service. The HTTP implementation lives in [`http`] behind the
//! `energidataservice` feature; tests substitute fixture-backed sources.

pub mod dto;
pub mod filter;
pub mod gln;
#[cfg(feature = "energidataservice")]
pub mod http;
pub mod query;

pub use dto::{Records, SpotPriceRecord, decode_records};
pub use filter::{ENERGINET_GLN, TariffFilter, default_filter, grid_company_name};
pub use gln::GlobalLocationNumber;
#[cfg(feature = "energidataservice")]
pub use http::EnergiDataServiceClient;
pub use query::{DateAnchor, DateOffset, DateQueryParameter};

use crate::error::Result;
use crate::normalizer::TariffRecord;
use crate::prices::{Currency, PriceMap};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Request for the `Elspotprices` dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotPriceQuery {
    pub price_area: String,
    pub currency: Currency,
    pub start: DateQueryParameter,
}

/// Request for one charge owner's tariff price lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffQuery {
    pub gln: GlobalLocationNumber,
    pub filter: TariffFilter,
}

/// Call quota metadata reported by the upstream API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiUsage {
    pub remaining_calls: Option<u64>,
    pub total_calls: Option<u64>,
    pub last_call: Option<DateTime<Utc>>,
}

/// Fetch collaborator for spot prices and tariff price lists
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Spot price records; fails with `Empty` when none are published
    async fn fetch_spot_prices(&self, query: &SpotPriceQuery) -> Result<Vec<SpotPriceRecord>>;

    /// Tariff records matching the filter; an empty result is not an error
    async fn fetch_tariffs(&self, query: &TariffQuery) -> Result<Vec<TariffRecord>>;

    /// Quota information from the most recent call
    fn api_usage(&self) -> Option<ApiUsage> {
        None
    }
}

/// Spot price records as a per-kWh series in `currency`
pub fn spot_prices_per_kwh(records: &[SpotPriceRecord], currency: Currency) -> PriceMap {
    let per_mwh = Decimal::from(1000);
    records
        .iter()
        .filter_map(|r| {
            let price = match currency {
                Currency::DKK => r.spot_price_dkk,
                Currency::EUR => r.spot_price_eur,
            }?;
            Some((r.hour, price / per_mwh))
        })
        .collect()
}
