//! Price components, consumed channels and currency handling

use crate::error::{ElspotError, Result};
use crate::time::{DATAHUB_ZONE, NORD_POOL_ZONE};
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Hour-start keyed series of per-kWh values
pub type PriceMap = BTreeMap<DateTime<Utc>, Decimal>;

/// One independently published price element
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PriceComponent {
    SpotPrice,
    NetTariff,
    SystemTariff,
    ElectricityTax,
    TransmissionNetTariff,
}

impl PriceComponent {
    pub const ALL: [Self; 5] = [
        Self::SpotPrice,
        Self::NetTariff,
        Self::SystemTariff,
        Self::ElectricityTax,
        Self::TransmissionNetTariff,
    ];

    /// Lower-case element name accepted by [`PriceComponent::parse`]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SpotPrice => "spotprice",
            Self::NetTariff => "nettariff",
            Self::SystemTariff => "systemtariff",
            Self::ElectricityTax => "electricitytax",
            Self::TransmissionNetTariff => "transmissionnettariff",
        }
    }

    /// Parse an element name, ignoring case and surrounding whitespace
    pub fn parse(name: &str) -> Result<Self> {
        let wanted = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| ElspotError::UnknownPriceElement {
                name: name.to_string(),
                accepted: Self::ALL
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Zone in which this component's publication and validity are defined
    pub const fn zone(self) -> Tz {
        match self {
            Self::SpotPrice => NORD_POOL_ZONE,
            _ => DATAHUB_ZONE,
        }
    }

    pub const fn is_tariff(self) -> bool {
        !matches!(self, Self::SpotPrice)
    }

    /// Channel carrying this component's current-hour value
    pub const fn current_channel(self) -> Channel {
        match self {
            Self::SpotPrice => Channel::CurrentSpotPrice,
            Self::NetTariff => Channel::CurrentNetTariff,
            Self::SystemTariff => Channel::CurrentSystemTariff,
            Self::ElectricityTax => Channel::CurrentElectricityTax,
            Self::TransmissionNetTariff => Channel::CurrentTransmissionNetTariff,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PriceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PriceComponent {
    type Err = ElspotError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PriceComponent {
    type Error = ElspotError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PriceComponent> for String {
    fn from(value: PriceComponent) -> Self {
        value.name().to_string()
    }
}

/// Published outputs a consumer can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "electricity#current-spot-price")]
    CurrentSpotPrice,
    #[serde(rename = "electricity#current-net-tariff")]
    CurrentNetTariff,
    #[serde(rename = "electricity#current-system-tariff")]
    CurrentSystemTariff,
    #[serde(rename = "electricity#current-electricity-tax")]
    CurrentElectricityTax,
    #[serde(rename = "electricity#current-transmission-net-tariff")]
    CurrentTransmissionNetTariff,
    #[serde(rename = "electricity#hourly-prices")]
    HourlyPrices,
}

impl Channel {
    pub const ALL: [Self; 6] = [
        Self::CurrentSpotPrice,
        Self::CurrentNetTariff,
        Self::CurrentSystemTariff,
        Self::CurrentElectricityTax,
        Self::CurrentTransmissionNetTariff,
        Self::HourlyPrices,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            Self::CurrentSpotPrice => "electricity#current-spot-price",
            Self::CurrentNetTariff => "electricity#current-net-tariff",
            Self::CurrentSystemTariff => "electricity#current-system-tariff",
            Self::CurrentElectricityTax => "electricity#current-electricity-tax",
            Self::CurrentTransmissionNetTariff => "electricity#current-transmission-net-tariff",
            Self::HourlyPrices => "electricity#hourly-prices",
        }
    }

    /// Component whose current value this channel carries
    pub const fn component(self) -> Option<PriceComponent> {
        match self {
            Self::CurrentSpotPrice => Some(PriceComponent::SpotPrice),
            Self::CurrentNetTariff => Some(PriceComponent::NetTariff),
            Self::CurrentSystemTariff => Some(PriceComponent::SystemTariff),
            Self::CurrentElectricityTax => Some(PriceComponent::ElectricityTax),
            Self::CurrentTransmissionNetTariff => Some(PriceComponent::TransmissionNetTariff),
            Self::HourlyPrices => None,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Currencies the spot price dataset is published in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Currency {
    /// Primary currency; tariffs are only published in DKK
    #[default]
    DKK,
    EUR,
}

impl Currency {
    pub const fn code(self) -> &'static str {
        match self {
            Self::DKK => "DKK",
            Self::EUR => "EUR",
        }
    }

    pub const fn is_primary(self) -> bool {
        matches!(self, Self::DKK)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ElspotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "DKK" => Ok(Self::DKK),
            "EUR" => Ok(Self::EUR),
            other => Err(ElspotError::validation(
                "service.currency",
                format!("Unsupported currency '{}'", other),
            )),
        }
    }
}

/// VAT multiplier for a country (ISO 3166 alpha-2)
pub fn vat_factor(country: &str) -> Decimal {
    match country.trim().to_uppercase().as_str() {
        "DK" | "NO" | "SE" => Decimal::new(125, 2),
        "DE" => Decimal::new(119, 2),
        _ => Decimal::ONE,
    }
}

/// One hour of the published future price curve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturePrice {
    pub hour_start: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub spot_price: Decimal,
    pub spot_price_currency: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision_option")]
    pub net_tariff: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::arbitrary_precision_option")]
    pub system_tariff: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::arbitrary_precision_option")]
    pub electricity_tax: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::arbitrary_precision_option")]
    pub transmission_net_tariff: Option<Decimal>,
}

impl FuturePrice {
    pub fn new(hour_start: DateTime<Utc>, spot_price: Decimal, currency: Currency) -> Self {
        Self {
            hour_start: hour_start.to_rfc3339_opts(SecondsFormat::Secs, true),
            spot_price,
            spot_price_currency: currency.code().to_string(),
            net_tariff: None,
            system_tariff: None,
            electricity_tax: None,
            transmission_net_tariff: None,
        }
    }

    /// Attach a tariff component value
    pub fn set(&mut self, component: PriceComponent, value: Option<Decimal>) {
        match component {
            PriceComponent::SpotPrice => {
                if let Some(v) = value {
                    self.spot_price = v;
                }
            }
            PriceComponent::NetTariff => self.net_tariff = value,
            PriceComponent::SystemTariff => self.system_tariff = value,
            PriceComponent::ElectricityTax => self.electricity_tax = value,
            PriceComponent::TransmissionNetTariff => self.transmission_net_tariff = value,
        }
    }
}
