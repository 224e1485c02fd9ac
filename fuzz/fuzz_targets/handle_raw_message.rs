#![no_main]
use libfuzzer_sys::fuzz_target;

use zoned::protocol::serialise::WritableBuffer;
use zoned::protocol::wire_types::MAX_DATAGRAM_SIZE;
use zoned::responder::handle_raw_message;
use zoned::server::serialise_reply;
use zoned::zones::ZoneStore;

fuzz_target!(|data: &[u8]| {
    let zone = ZoneStore::deserialise("www.example.com. IN A 93.184.216.34").unwrap();
    if let Some(response) = handle_raw_message(data, &zone) {
        assert!(response.header.is_response);
        let mut buffer = WritableBuffer::with_limit(MAX_DATAGRAM_SIZE);
        assert!(serialise_reply(&response, &mut buffer).is_ok());
    }
});
