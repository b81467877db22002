#![no_main]
use libfuzzer_sys::fuzz_target;

use mqtt_packet::{decode_connack, decode_puback, decode_suback, decode_unsuback};

fuzz_target!(|data: &[u8]| {
    let _ = decode_connack(data);
    let _ = decode_suback(data);
    let _ = decode_unsuback(data);
    let _ = decode_puback(data);
});
