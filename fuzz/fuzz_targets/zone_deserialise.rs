#![no_main]
use libfuzzer_sys::fuzz_target;

use zoned::zones::ZoneStore;

fuzz_target!(|data: &str| {
    if let Ok(zone) = ZoneStore::deserialise(data) {
        for rr in zone.iter() {
            assert_eq!(Some(rr), zone.lookup(&rr.name));
            assert!(rr.address().is_some());
        }
    }
});
