//! Wire records of the Energi Data Service dataset API

use crate::error::{ElspotError, Result};
use crate::normalizer::TariffRecord;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::de::{self, DeserializeOwned, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Number of hourly price columns in a Datahub price list
pub const PRICE_COLUMNS: usize = 24;

/// Envelope of every dataset response
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Records<T> {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub dataset: String,
    #[serde(default)]
    pub records: Vec<Option<T>>,
}

impl<T> Records<T> {
    /// More records exist upstream than were returned
    pub fn is_truncated(&self) -> bool {
        self.limit > 0 && self.limit < self.total
    }

    /// Records without the null entries
    pub fn into_records(self) -> Vec<T> {
        self.records.into_iter().flatten().collect()
    }
}

/// Decode a dataset response body
pub fn decode_records<T: DeserializeOwned>(body: &str) -> Result<Records<T>> {
    if body.trim().is_empty() {
        return Err(ElspotError::empty("Empty response"));
    }
    serde_json::from_str(body)
        .map_err(|e| ElspotError::parse(format!("Error parsing response: {}", e)))
}

/// One hour of the `Elspotprices` dataset, prices per MWh
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpotPriceRecord {
    #[serde(rename = "HourUTC", deserialize_with = "deserialize_hour_utc")]
    pub hour: DateTime<Utc>,
    #[serde(rename = "SpotPriceDKK", default)]
    pub spot_price_dkk: Option<Decimal>,
    #[serde(rename = "SpotPriceEUR", default)]
    pub spot_price_eur: Option<Decimal>,
}

/// Parse a UTC instant, with or without a trailing `Z`
pub fn parse_hour_utc(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim().trim_end_matches('Z');
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| ElspotError::parse(format!("Invalid HourUTC '{}': {}", value, e)))?;
    Ok(naive.and_utc())
}

fn deserialize_hour_utc<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<DateTime<Utc>, D::Error> {
    let value = String::deserialize(deserializer)?;
    parse_hour_utc(&value).map_err(de::Error::custom)
}

impl<'de> Deserialize<'de> for TariffRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(TariffRecordVisitor)
    }
}

struct TariffRecordVisitor;

impl<'de> Visitor<'de> for TariffRecordVisitor {
    type Value = TariffRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a DatahubPricelist record")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut valid_from: Option<NaiveDateTime> = None;
        let mut valid_to: Option<NaiveDateTime> = None;
        let mut charge_type_code = String::new();
        let mut prices: Vec<Option<Decimal>> = vec![None; PRICE_COLUMNS];

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "ValidFrom" => valid_from = Some(map.next_value()?),
                "ValidTo" => valid_to = map.next_value()?,
                "ChargeTypeCode" => {
                    charge_type_code = map.next_value::<Option<String>>()?.unwrap_or_default();
                }
                other => match price_column(other) {
                    Some(index) => prices[index] = map.next_value()?,
                    None => {
                        map.next_value::<IgnoredAny>()?;
                    }
                },
            }
        }

        let valid_from = valid_from.ok_or_else(|| de::Error::missing_field("ValidFrom"))?;
        Ok(TariffRecord::new(valid_from, valid_to, charge_type_code, prices))
    }
}

/// Zero-based index of a `Price1`..`Price24` column
fn price_column(key: &str) -> Option<usize> {
    let n: usize = key.strip_prefix("Price")?.parse().ok()?;
    (1..=PRICE_COLUMNS).contains(&n).then(|| n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_hour_utc_with_and_without_zulu() {
        let a = parse_hour_utc("2023-02-04T12:00:00").unwrap();
        let b = parse_hour_utc("2023-02-04T12:00:00Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_rfc3339(), "2023-02-04T12:00:00+00:00");
        assert!(parse_hour_utc("yesterday").is_err());
    }

    #[test]
    fn test_decode_spot_records() {
        let body = r#"{"total":2,"filters":"{\"PriceArea\":\"DK1\"}","limit":100,"dataset":"Elspotprices",
            "records":[{"HourUTC":"2023-02-04T12:00:00","SpotPriceDKK":992.840027},null]}"#;
        let records: Records<SpotPriceRecord> = decode_records(body).unwrap();
        assert_eq!(records.total, 2);
        assert!(!records.is_truncated());
        let records = records.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].spot_price_dkk,
            Some(Decimal::from_str("992.840027").unwrap())
        );
        assert_eq!(records[0].spot_price_eur, None);
    }

    #[test]
    fn test_decode_price_list() {
        let body = r#"{"total":3,"limit":1,"dataset":"DatahubPricelist","records":[
            {"ValidFrom":"2023-01-01T00:00:00","ValidTo":null,"ChargeTypeCode":"41000",
             "Price1":0.054,"Price2":null,"Price24":null,"Note":"Systemtarif"}]}"#;
        let records: Records<TariffRecord> = decode_records(body).unwrap();
        assert!(records.is_truncated());
        let record = &records.into_records()[0];
        assert_eq!(record.charge_type_code, "41000");
        assert!(record.valid_to.is_none());
        assert!(record.is_flat_rate());
        assert_eq!(record.prices[0], Some(Decimal::from_str("0.054").unwrap()));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode_records::<SpotPriceRecord>("  "),
            Err(ElspotError::Empty { .. })
        ));
        assert!(matches!(
            decode_records::<SpotPriceRecord>("{\"records\":[{"),
            Err(ElspotError::Parse { .. })
        ));
        assert!(matches!(
            decode_records::<TariffRecord>("{\"records\":[{\"Price1\":1}]}"),
            Err(ElspotError::Parse { .. })
        ));
    }

    #[test]
    fn test_price_column() {
        assert_eq!(price_column("Price1"), Some(0));
        assert_eq!(price_column("Price24"), Some(23));
        assert_eq!(price_column("Price25"), None);
        assert_eq!(price_column("Price0"), None);
        assert_eq!(price_column("PriceX"), None);
    }
}
