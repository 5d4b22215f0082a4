#![no_main]
use elspot::normalizer::{PriceListNormalizer, TariffRecord};
use elspot::source::{Records, SpotPriceRecord, decode_records};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };

    let _ = decode_records::<SpotPriceRecord>(body);

    // Whatever decodes must also normalize without panicking
    if let Ok(records) = decode_records::<TariffRecord>(body).map(Records::into_records) {
        if let Some(first) = records.first() {
            let now = first.valid_from.and_utc();
            let _ = PriceListNormalizer::new(elspot::time::DATAHUB_ZONE).to_hourly(&records, now);
        }
    }
});
