//! Fuzz test for Base58Check decoding

#![no_main]

use cipherscan_core::{decode_check, encode_check};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = decode_check(s);
    }

    // Anything we encode must decode back
    if data.len() >= 2 {
        let encoded = encode_check(&data[..2], &data[2..]);
        assert_eq!(decode_check(&encoded).as_deref(), Ok(data));
    }
});
