//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use elspot::config::Config;
use elspot::error::{ElspotError, Result};
use elspot::normalizer::TariffRecord;
use elspot::orchestrator::{PriceService, PriceSink, ServiceStatus};
use elspot::prices::Channel;
use elspot::source::{
    PriceSource, Records, SpotPriceQuery, SpotPriceRecord, TariffQuery, decode_records,
};
use elspot::time::FixedClock;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SPOT_PRICES: &str = include_str!("../fixtures/spot_prices.json");
pub const NET_TARIFFS: &str = include_str!("../fixtures/net_tariffs.json");
pub const SYSTEM_TARIFFS: &str = include_str!("../fixtures/system_tariffs.json");
pub const ELECTRICITY_TAXES: &str = include_str!("../fixtures/electricity_taxes.json");
pub const TRANSMISSION_NET_TARIFFS: &str =
    include_str!("../fixtures/transmission_net_tariffs.json");

/// Radius Elnet, whose default net tariff filter matches the fixture
pub const RADIUS_GLN: &str = "5790000610099";

pub fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Clock fixed at the instant the fixtures were captured
pub fn fixture_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(utc("2023-02-04T12:00:00Z")))
}

pub fn fixture_config() -> Config {
    let mut config = Config::default();
    config.service.grid_company_gln = RADIUS_GLN.to_string();
    config.logging.console_output = false;
    config
}

/// Source serving the JSON fixtures, with call counters and failure injection
#[derive(Debug, Default)]
pub struct FixtureSource {
    spot_calls: AtomicUsize,
    tariff_calls: Mutex<BTreeMap<String, usize>>,
    fail_with_status: Mutex<Option<u16>>,
    stalled: AtomicBool,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following fetch fail with `status`; `None` restores success
    pub fn fail_with(&self, status: Option<u16>) {
        *self.fail_with_status.lock().unwrap() = status;
    }

    /// Make every following fetch hang without ever answering
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn spot_calls(&self) -> usize {
        self.spot_calls.load(Ordering::SeqCst)
    }

    /// Number of tariff fetches for a charge type code
    pub fn tariff_calls(&self, code: &str) -> usize {
        self.tariff_calls
            .lock()
            .unwrap()
            .get(code)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.spot_calls() + self.tariff_calls.lock().unwrap().values().sum::<usize>()
    }

    async fn check_failure(&self) -> Result<()> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        match *self.fail_with_status.lock().unwrap() {
            Some(status) => Err(ElspotError::http_status(
                status,
                format!("The request failed with HTTP error {}", status),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PriceSource for FixtureSource {
    async fn fetch_spot_prices(&self, query: &SpotPriceQuery) -> Result<Vec<SpotPriceRecord>> {
        self.spot_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure().await?;
        assert_eq!(query.price_area, "DK1");
        let records: Records<SpotPriceRecord> = decode_records(SPOT_PRICES)?;
        Ok(records.into_records())
    }

    async fn fetch_tariffs(&self, query: &TariffQuery) -> Result<Vec<TariffRecord>> {
        let code = query
            .filter
            .charge_type_codes
            .iter()
            .next()
            .cloned()
            .unwrap_or_default();
        *self.tariff_calls.lock().unwrap().entry(code.clone()).or_insert(0) += 1;
        self.check_failure().await?;

        let body = match code.as_str() {
            "41000" => SYSTEM_TARIFFS,
            "EA-001" => ELECTRICITY_TAXES,
            "40000" => TRANSMISSION_NET_TARIFFS,
            "DT_C_01" => NET_TARIFFS,
            other => panic!("unexpected charge type code {other}"),
        };
        let records: Records<TariffRecord> = decode_records(body)?;
        Ok(records.into_records())
    }
}

/// One publication received by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    Current(Channel, Option<Decimal>),
    FuturePrices(String),
    Status(ServiceStatus),
    Property(String, String),
}

/// Sink keeping every publication in order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Published>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Published> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Last value published on `channel`, `None` if never published
    pub fn last_current(&self, channel: Channel) -> Option<Option<Decimal>> {
        self.events().into_iter().rev().find_map(|e| match e {
            Published::Current(c, v) if c == channel => Some(v),
            _ => None,
        })
    }

    pub fn last_status(&self) -> Option<ServiceStatus> {
        self.events().into_iter().rev().find_map(|e| match e {
            Published::Status(s) => Some(s),
            _ => None,
        })
    }

    pub fn last_future_prices(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e {
            Published::FuturePrices(json) => Some(json),
            _ => None,
        })
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e {
            Published::Property(k, v) if k == key => Some(v),
            _ => None,
        })
    }
}

impl PriceSink for RecordingSink {
    fn publish_current(&self, channel: Channel, value: Option<Decimal>) {
        self.events
            .lock()
            .unwrap()
            .push(Published::Current(channel, value));
    }

    fn publish_future_prices(&self, json: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Published::FuturePrices(json.to_string()));
    }

    fn publish_status(&self, status: &ServiceStatus) {
        self.events
            .lock()
            .unwrap()
            .push(Published::Status(status.clone()));
    }

    fn publish_property(&self, key: &str, value: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Published::Property(key.to_string(), value.to_string()));
    }
}

/// Service over the fixtures at the capture instant
pub fn fixture_service(config: Config) -> (Arc<PriceService>, Arc<FixtureSource>, Arc<FixedClock>) {
    let clock = fixture_clock();
    let source = Arc::new(FixtureSource::new());
    let service = Arc::new(PriceService::new(config, source.clone(), clock.clone()));
    (service, source, clock)
}
