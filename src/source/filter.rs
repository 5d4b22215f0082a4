//! Datahub price list filters and the pre-configured defaults per charge owner

use super::gln::GlobalLocationNumber;
use super::query::{DateAnchor, DateQueryParameter};
use crate::prices::PriceComponent;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// GLN of Energinet, owner of system and transmission tariffs and the tax
pub const ENERGINET_GLN: &str = "5790000432752";

/// Selection of tariff records within a charge owner's price lists
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffFilter {
    pub charge_type_codes: BTreeSet<String>,
    pub notes: BTreeSet<String>,
    pub start: DateQueryParameter,
}

impl TariffFilter {
    pub fn new<C, N>(charge_type_codes: C, notes: N, start: DateQueryParameter) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        Self {
            charge_type_codes: charge_type_codes.into_iter().map(Into::into).collect(),
            notes: notes.into_iter().map(Into::into).collect(),
            start,
        }
    }

    /// No charge type codes and no notes
    pub fn has_no_selection(&self) -> bool {
        self.charge_type_codes.is_empty() && self.notes.is_empty()
    }

    /// Nothing overridden at all
    pub fn is_empty(&self) -> bool {
        self.has_no_selection() && self.start.is_empty()
    }

    /// Apply a configured override to a default filter.
    ///
    /// Codes or notes in the override replace the default filter entirely.
    /// An override carrying only a start keeps the default selection.
    pub fn resolve(default: &Self, override_filter: Option<&Self>) -> Self {
        match override_filter {
            None => default.clone(),
            Some(o) if o.is_empty() => default.clone(),
            Some(o) if !o.has_no_selection() => o.clone(),
            Some(o) => Self {
                start: o.start,
                ..default.clone()
            },
        }
    }
}

fn energinet_start() -> DateQueryParameter {
    NaiveDate::from_ymd_opt(2023, 1, 1).map_or(DateQueryParameter::Empty, DateQueryParameter::Date)
}

pub fn system_tariff_filter() -> TariffFilter {
    TariffFilter::new(["41000"], ["Systemtarif"], energinet_start())
}

pub fn electricity_tax_filter() -> TariffFilter {
    TariffFilter::new(["EA-001"], ["Elafgift"], energinet_start())
}

pub fn transmission_net_tariff_filter() -> TariffFilter {
    TariffFilter::new(["40000"], ["Transmissions nettarif"], energinet_start())
}

/// Known grid companies and the charge type codes of their consumer tariff
const GRID_COMPANIES: &[(&str, &str, &[&str])] = &[
    ("5790000610099", "Radius Elnet", &["DT_C_01"]),
    ("5790000705184", "Cerius", &["30TR_C_ET"]),
    ("5790001089030", "N1", &["CD", "CD R"]),
    ("5790000392261", "Trefor El-net", &["C"]),
    ("5790000704842", "Konstant", &["151-NT01T", "151-NRA04T"]),
];

/// Name of a known grid company
pub fn grid_company_name(gln: &GlobalLocationNumber) -> Option<&'static str> {
    GRID_COMPANIES
        .iter()
        .find(|(g, _, _)| *g == gln.as_str())
        .map(|(_, name, _)| *name)
}

/// Pre-configured net tariff filter for a grid company.
/// Unknown companies get an empty selection.
pub fn net_tariff_filter(gln: &GlobalLocationNumber) -> TariffFilter {
    let codes = GRID_COMPANIES
        .iter()
        .find(|(g, _, _)| *g == gln.as_str())
        .map(|(_, _, codes)| codes.iter().copied().collect::<Vec<_>>())
        .unwrap_or_default();
    TariffFilter::new(
        codes,
        std::iter::empty::<String>(),
        DateQueryParameter::anchor(DateAnchor::StartOfYear),
    )
}

/// Default filter for a tariff component, `None` for the spot price
pub fn default_filter(component: PriceComponent, grid_company: &GlobalLocationNumber) -> Option<TariffFilter> {
    match component {
        PriceComponent::SpotPrice => None,
        PriceComponent::NetTariff => Some(net_tariff_filter(grid_company)),
        PriceComponent::SystemTariff => Some(system_tariff_filter()),
        PriceComponent::ElectricityTax => Some(electricity_tax_filter()),
        PriceComponent::TransmissionNetTariff => Some(transmission_net_tariff_filter()),
    }
}
