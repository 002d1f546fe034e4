//! Trial-decryption primitive boundary
//!
//! Workers never touch Orchard types directly. Each worker owns one
//! [`TrialDecryptor`], created on its first job by the process-wide
//! [`DecryptorLoader`]. The native Orchard loader is used unless another one is
//! installed with [`install_loader`] before the first scan.

use crate::orchard::NativeLoader;
use crate::{Error, Result};
use cipherscan_params::NetworkType;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Hex-encoded compact output handed to the primitive.
///
/// Sapling outputs use a zero-filled nullifier and their `cmu` as `cmx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactOutputRecord {
    /// Nullifier (32 bytes hex)
    pub nullifier: String,
    /// Note commitment (32 bytes hex)
    pub cmx: String,
    /// Ephemeral public key (32 bytes hex)
    pub ephemeral_key: String,
    /// Compact ciphertext prefix (52 bytes hex)
    pub ciphertext: String,
}

/// Zero-filled nullifier used for Sapling candidates
pub const SAPLING_PLACEHOLDER_NULLIFIER: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Memo recovered from a full transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecryptedMemo {
    /// Memo text
    pub memo: String,
    /// Note value in ZEC
    pub amount: f64,
}

/// Viewing key classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Mainnet unified full viewing key
    #[serde(rename = "ufvk-mainnet")]
    UfvkMainnet,
    /// Testnet unified full viewing key
    #[serde(rename = "ufvk-testnet")]
    UfvkTestnet,
    /// Anything else
    #[serde(rename = "unknown")]
    Unknown,
}

impl KeyType {
    /// Tag as reported to callers
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UfvkMainnet => "ufvk-mainnet",
            Self::UfvkTestnet => "ufvk-testnet",
            Self::Unknown => "unknown",
        }
    }

    /// UFVK tag for `network`
    pub const fn for_network(network: NetworkType) -> Self {
        match network {
            NetworkType::Mainnet => Self::UfvkMainnet,
            NetworkType::Testnet => Self::UfvkTestnet,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a viewing key by its human-readable prefix.
///
/// Testnet is checked first: the mainnet prefix `uview` is a prefix of
/// `uviewtest`.
pub fn detect_key_type(viewing_key: &str) -> KeyType {
    let key = viewing_key.trim();
    [NetworkType::Testnet, NetworkType::Mainnet]
        .into_iter()
        .find(|network| key.starts_with(network.params().ufvk_prefix))
        .map_or(KeyType::Unknown, KeyType::for_network)
}

/// Trial-decryption primitive
pub trait TrialDecryptor: Send {
    /// Indices into `records` of outputs that decrypt under `viewing_key`.
    ///
    /// Malformed records do not match; an unusable viewing key is an error.
    fn batch_filter_compact_outputs(
        &self,
        records: &[CompactOutputRecord],
        viewing_key: &str,
    ) -> Result<Vec<usize>>;

    /// Decrypt the first non-empty memo addressed to `viewing_key` in a full transaction
    fn decrypt_memo(&self, tx_hex: &str, viewing_key: &str) -> Result<DecryptedMemo>;

    /// Classify a viewing key
    fn detect_key_type(&self, viewing_key: &str) -> KeyType {
        detect_key_type(viewing_key)
    }
}

/// Creates one [`TrialDecryptor`] per worker
pub trait DecryptorLoader: Send + Sync {
    /// Load a fresh primitive instance
    fn load(&self) -> Result<Box<dyn TrialDecryptor>>;
}

static LOADER: OnceCell<Arc<dyn DecryptorLoader>> = OnceCell::new();

/// Install the process-wide loader.
///
/// Fails if a loader was already installed or the default was already used.
pub fn install_loader(loader: Arc<dyn DecryptorLoader>) -> Result<()> {
    LOADER
        .set(loader)
        .map_err(|_| Error::WorkerPool("decryptor loader already initialised".to_string()))
}

/// Process-wide loader, initialising the native Orchard loader on first use
pub fn loader() -> Arc<dyn DecryptorLoader> {
    LOADER
        .get_or_init(|| Arc::new(NativeLoader) as Arc<dyn DecryptorLoader>)
        .clone()
}
