//! CipherScan core
//!
//! Raw Zcash transaction decoding for display: a bounds-checked byte cursor,
//! SHA-256, Base58Check, transparent script classification and the versioned
//! transaction decoder.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod base58;
pub mod cursor;
pub mod error;
pub mod script;
pub mod sha256;
pub mod transaction;

pub use base58::{decode_check, encode_check};
pub use cursor::{decode_hex, ByteCursor};
pub use error::{Error, ErrorCategory, Result};
pub use script::{classify, AddressType, ResolvedScript, ScriptAddressResolver};
pub use sha256::{sha256, sha256d, Sha256};
pub use transaction::{
    decode_transaction, OrchardFlags, OrchardSummary, ParsedTransaction, SaplingSummary,
    TransactionDecoder, TransparentInput, TransparentOutput, MIN_TX_BYTES, ZATOSHIS_PER_ZEC,
};

pub use cipherscan_params::NetworkType;
