//! Fuzz test for raw transaction decoding
//!
//! Arbitrary bytes must decode or fail with an error, never panic or
//! over-allocate on huge compact-size counts.

#![no_main]

use cipherscan_core::{NetworkType, TransactionDecoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let decoder = TransactionDecoder::new();
    if let Ok(tx) = decoder.decode(data) {
        assert_eq!(tx.size, data.len());
    }

    let _ = TransactionDecoder::new()
        .with_network(NetworkType::Testnet)
        .decode(data);

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = decoder.decode_hex(s);
    }
});
