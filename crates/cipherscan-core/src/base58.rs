//! Base58Check encoding for transparent addresses

use crate::sha256::sha256d;
use crate::{Error, Result};

/// Checksum length appended to the payload
pub const CHECKSUM_LEN: usize = 4;

/// Encode `version || payload || checksum` in Base58.
///
/// The checksum is the first four bytes of `SHA256(SHA256(version || payload))`.
/// Leading zero bytes become leading `1` characters.
pub fn encode_check(version: &[u8], payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(version.len() + payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(version);
    data.extend_from_slice(payload);
    let checksum = sha256d(&data);
    data.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(data).into_string()
}

/// Decode a Base58Check string, returning `version || payload`.
pub fn decode_check(encoded: &str) -> Result<Vec<u8>> {
    let mut data = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| Error::InvalidBase58(e.to_string()))?;
    if data.len() < CHECKSUM_LEN {
        return Err(Error::InvalidBase58(format!(
            "{} bytes is shorter than the checksum",
            data.len()
        )));
    }

    let split = data.len() - CHECKSUM_LEN;
    let expected = sha256d(&data[..split]);
    if data[split..] != expected[..CHECKSUM_LEN] {
        return Err(Error::ChecksumMismatch);
    }
    data.truncate(split);
    Ok(data)
}
