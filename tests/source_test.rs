mod common;

use common::{NET_TARIFFS, SPOT_PRICES, SYSTEM_TARIFFS, dec, utc};
use elspot::normalizer::{PriceListNormalizer, TariffRecord};
use elspot::prices::{Currency, PriceComponent};
use elspot::source::{
    DateQueryParameter, GlobalLocationNumber, Records, SpotPriceRecord, TariffFilter,
    decode_records, default_filter, spot_prices_per_kwh,
};
use elspot::time::DATAHUB_ZONE;

#[test]
fn spot_fixture_converts_to_kwh() {
    let records: Records<SpotPriceRecord> = decode_records(SPOT_PRICES).unwrap();
    assert_eq!(records.total, 35);
    assert!(!records.is_truncated());

    let dkk = spot_prices_per_kwh(&records.into_records(), Currency::DKK);
    assert_eq!(dkk.len(), 35);
    assert_eq!(dkk[&utc("2023-02-04T15:00:00Z")], dec("1.156540039"));
    assert_eq!(*dkk.keys().next_back().unwrap(), utc("2023-02-05T22:00:00Z"));
}

#[test]
fn net_tariff_fixture_normalizes_peak_hours() {
    let records: Records<TariffRecord> = decode_records(NET_TARIFFS).unwrap();
    let records = records.into_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].charge_type_code, "DT_C_01");

    let now = utc("2023-02-04T12:00:00Z");
    let hourly = PriceListNormalizer::new(DATAHUB_ZONE).to_hourly(&records, now);
    // Current hour to midnight ending tomorrow, Copenhagen time
    assert_eq!(hourly.len(), 35);
    assert_eq!(hourly[&utc("2023-02-04T15:00:00Z")], dec("0.432225"));
    assert_eq!(hourly[&utc("2023-02-04T16:00:00Z")], dec("1.05619"));
    assert_eq!(hourly[&utc("2023-02-05T19:00:00Z")], dec("1.05619"));
    assert_eq!(hourly[&utc("2023-02-05T20:00:00Z")], dec("0.432225"));
}

#[test]
fn open_ended_flat_rate_covers_every_hour() {
    let records: Records<TariffRecord> = decode_records(SYSTEM_TARIFFS).unwrap();
    let records = records.into_records();
    assert!(records[0].valid_to.is_none());
    assert!(records[0].is_flat_rate());

    let hourly = PriceListNormalizer::new(DATAHUB_ZONE).to_hourly(&records[..1], utc("2023-02-04T12:00:00Z"));
    assert_eq!(hourly.len(), 35);
    assert!(hourly.values().all(|v| *v == dec("0.054")));
}

#[test]
fn net_tariff_override_replaces_default() {
    let radius = GlobalLocationNumber::new("5790000610099");
    let default = default_filter(PriceComponent::NetTariff, &radius).unwrap();
    assert!(default.charge_type_codes.contains("DT_C_01"));
    assert!(default_filter(PriceComponent::SpotPrice, &radius).is_none());

    let codes_only = TariffFilter::new(["DT_C_02"], Vec::<String>::new(), DateQueryParameter::Empty);
    let resolved = TariffFilter::resolve(&default, Some(&codes_only));
    assert_eq!(resolved, codes_only);

    let start_only = TariffFilter::new(
        Vec::<String>::new(),
        Vec::<String>::new(),
        "2022-06-01".parse().unwrap(),
    );
    let resolved = TariffFilter::resolve(&default, Some(&start_only));
    assert_eq!(resolved.charge_type_codes, default.charge_type_codes);
    assert_eq!(resolved.start.to_string(), "2022-06-01");
}
