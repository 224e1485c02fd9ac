#![no_main]
use libfuzzer_sys::fuzz_target;

use zoned::protocol::wire_types::Message;

fuzz_target!(|data: &[u8]| {
    if let Ok(deserialised) = Message::from_octets(data) {
        if let Ok(serialised) = deserialised.to_octets() {
            assert_eq!(data.len(), serialised.len());
            assert_eq!(Ok(deserialised), Message::from_octets(&serialised));
        }
    }
});
