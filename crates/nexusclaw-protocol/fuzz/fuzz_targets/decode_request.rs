#![no_main]

use libfuzzer_sys::fuzz_target;
use nexusclaw_protocol::codec::decode_request;

fuzz_target!(|data: &str| {
    let _ = decode_request(data);
});
