//! Energi Data Service HTTP client

use super::dto::{Records, SpotPriceRecord, decode_records};
use super::{ApiUsage, PriceSource, SpotPriceQuery, TariffQuery};
use crate::config::ApiConfig;
use crate::error::{ElspotError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::normalizer::TariffRecord;
use crate::time::Clock;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const DATASET_PATH: &str = "dataset/";
const DATASET_SPOT_PRICES: &str = "Elspotprices";
const DATASET_PRICE_LIST: &str = "DatahubPricelist";

const HEADER_REMAINING_CALLS: &str = "RemainingCalls";
const HEADER_TOTAL_CALLS: &str = "TotalCalls";

/// Datahub charge type of tariffs (as opposed to subscriptions and fees)
const CHARGE_TYPE_TARIFF: &str = "D03";

/// Client for the `Elspotprices` and `DatahubPricelist` datasets
pub struct EnergiDataServiceClient {
    client: reqwest::Client,
    endpoint: String,
    clock: Arc<dyn Clock>,
    usage: Mutex<ApiUsage>,
    logger: StructuredLogger,
}

impl EnergiDataServiceClient {
    pub fn new(config: &ApiConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let mut endpoint = config.endpoint.trim().to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Ok(Self {
            client,
            endpoint,
            clock,
            usage: Mutex::new(ApiUsage::default()),
            logger: get_logger("source"),
        })
    }

    fn dataset_url(&self, dataset: &str) -> String {
        format!("{}{}{}", self.endpoint, DATASET_PATH, dataset)
    }

    async fn get_dataset(&self, dataset: &str, params: &[(&'static str, String)]) -> Result<String> {
        let url = self.dataset_url(dataset);
        self.logger
            .trace(&format!("GET request for {} with {:?}", url, params));

        let response = self
            .client
            .get(&url)
            .query(params)
            .header(USER_AGENT, user_agent())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        self.record_usage(response.headers());

        let status = response.status();
        if !status.is_success() {
            return Err(ElspotError::http_status(
                status.as_u16(),
                format!("The request failed with HTTP error {}", status),
            ));
        }

        let body = response.text().await?;
        self.logger.trace(&format!("Response content: '{}'", body));
        Ok(body)
    }

    fn record_usage(&self, headers: &reqwest::header::HeaderMap) {
        let header_count = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };
        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(remaining) = header_count(HEADER_REMAINING_CALLS) {
            usage.remaining_calls = Some(remaining);
        }
        if let Some(total) = header_count(HEADER_TOTAL_CALLS) {
            usage.total_calls = Some(total);
        }
        usage.last_call = Some(self.clock.now());
    }
}

fn user_agent() -> String {
    format!("elspot/{}", env!("APP_VERSION"))
}

/// Query parameters of a spot price request
pub fn spot_price_params(query: &SpotPriceQuery) -> Vec<(&'static str, String)> {
    let mut filter = Map::new();
    filter.insert(
        "PriceArea".to_string(),
        Value::String(query.price_area.clone()),
    );
    let mut params = Vec::with_capacity(3);
    if !query.start.is_empty() {
        params.push(("start", query.start.to_string()));
    }
    params.push(("filter", Value::Object(filter).to_string()));
    params.push(("columns", format!("HourUTC,SpotPrice{}", query.currency.code())));
    params
}

fn string_array(values: &BTreeSet<String>) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

/// Query parameters of a tariff price list request
pub fn price_list_params(query: &TariffQuery) -> Vec<(&'static str, String)> {
    let mut filter = Map::new();
    filter.insert(
        "GLN_Number".to_string(),
        Value::Array(vec![Value::String(query.gln.to_string())]),
    );
    filter.insert(
        "ChargeType".to_string(),
        Value::Array(vec![Value::String(CHARGE_TYPE_TARIFF.to_string())]),
    );
    if !query.filter.charge_type_codes.is_empty() {
        filter.insert(
            "ChargeTypeCode".to_string(),
            string_array(&query.filter.charge_type_codes),
        );
    }
    if !query.filter.notes.is_empty() {
        filter.insert("Note".to_string(), string_array(&query.filter.notes));
    }

    let columns = std::iter::once("ValidFrom,ValidTo,ChargeTypeCode".to_string())
        .chain((1..=super::dto::PRICE_COLUMNS).map(|i| format!("Price{}", i)))
        .collect::<Vec<_>>()
        .join(",");

    let mut params = vec![
        ("filter", Value::Object(filter).to_string()),
        ("columns", columns),
    ];
    if !query.filter.start.is_empty() {
        params.push(("start", query.filter.start.to_string()));
    }
    params
}

#[async_trait]
impl PriceSource for EnergiDataServiceClient {
    async fn fetch_spot_prices(&self, query: &SpotPriceQuery) -> Result<Vec<SpotPriceRecord>> {
        let body = self
            .get_dataset(DATASET_SPOT_PRICES, &spot_price_params(query))
            .await?;
        let records: Records<SpotPriceRecord> = decode_records(&body)?;
        if records.total == 0 || records.records.is_empty() {
            return Err(ElspotError::empty("No records"));
        }
        Ok(records.into_records())
    }

    async fn fetch_tariffs(&self, query: &TariffQuery) -> Result<Vec<TariffRecord>> {
        let body = self
            .get_dataset(DATASET_PRICE_LIST, &price_list_params(query))
            .await?;
        let records: Records<TariffRecord> = decode_records(&body)?;
        if records.is_truncated() {
            self.logger.warn(&format!(
                "{} price list records available, but only {} returned.",
                records.total, records.limit
            ));
        }
        Ok(records.into_records())
    }

    fn api_usage(&self) -> Option<ApiUsage> {
        let usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        usage.last_call.is_some().then(|| usage.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::Currency;
    use crate::source::filter::net_tariff_filter;
    use crate::source::{DateAnchor, DateOffset, DateQueryParameter, GlobalLocationNumber};
    use crate::time::SystemClock;

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_spot_price_params() {
        let query = SpotPriceQuery {
            price_area: "DK1".to_string(),
            currency: Currency::EUR,
            start: DateQueryParameter::with_offset(DateAnchor::UtcNow, DateOffset::Hours(-24)),
        };
        let params = spot_price_params(&query);
        assert_eq!(param(&params, "start"), Some("UtcNow-PT24H"));
        assert_eq!(param(&params, "filter"), Some(r#"{"PriceArea":"DK1"}"#));
        assert_eq!(param(&params, "columns"), Some("HourUTC,SpotPriceEUR"));
    }

    #[test]
    fn test_price_list_params() {
        let gln = GlobalLocationNumber::new("5790001089030");
        let query = TariffQuery {
            filter: net_tariff_filter(&gln),
            gln,
        };
        let params = price_list_params(&query);
        let filter: Value = serde_json::from_str(param(&params, "filter").unwrap()).unwrap();
        assert_eq!(filter["GLN_Number"][0], "5790001089030");
        assert_eq!(filter["ChargeType"][0], "D03");
        assert_eq!(filter["ChargeTypeCode"].as_array().unwrap().len(), 2);
        assert!(filter.get("Note").is_none());
        assert_eq!(param(&params, "start"), Some("StartOfYear"));
        let columns = param(&params, "columns").unwrap();
        assert!(columns.starts_with("ValidFrom,ValidTo,ChargeTypeCode,Price1,"));
        assert!(columns.ends_with(",Price24"));
    }

    #[test]
    fn test_start_omitted_when_empty() {
        let query = TariffQuery {
            gln: GlobalLocationNumber::new("5790000432752"),
            filter: crate::source::TariffFilter::new(["41000"], ["Systemtarif"], DateQueryParameter::Empty),
        };
        assert!(param(&price_list_params(&query), "start").is_none());
    }

    #[test]
    fn test_client_normalizes_endpoint() {
        let config = ApiConfig {
            endpoint: "https://example.invalid".to_string(),
            timeout_secs: 5,
        };
        let client = EnergiDataServiceClient::new(&config, Arc::new(SystemClock)).unwrap();
        assert_eq!(
            client.dataset_url(DATASET_SPOT_PRICES),
            "https://example.invalid/dataset/Elspotprices"
        );
        assert!(client.api_usage().is_none());
    }
}
