//! Zcash network definitions

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network type enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Mainnet
    #[default]
    Mainnet,
    /// Testnet (regtest shares the testnet prefixes)
    Testnet,
}

/// Network configuration
#[derive(Debug, Clone)]
pub struct Network {
    /// Network type
    pub network_type: NetworkType,
    /// Human-readable name
    pub name: &'static str,
    /// Base58Check version bytes for P2PKH transparent addresses
    pub p2pkh_prefix: [u8; 2],
    /// Base58Check version bytes for P2SH transparent addresses
    pub p2sh_prefix: [u8; 2],
    /// Human-readable prefix of unified full viewing keys
    pub ufvk_prefix: &'static str,
}

impl Network {
    /// Get mainnet parameters
    pub const fn mainnet() -> Self {
        Self {
            network_type: NetworkType::Mainnet,
            name: "mainnet",
            p2pkh_prefix: [0x1c, 0xb8], // t1
            p2sh_prefix: [0x1c, 0xbd],  // t3
            ufvk_prefix: "uview",
        }
    }

    /// Get testnet parameters
    pub const fn testnet() -> Self {
        Self {
            network_type: NetworkType::Testnet,
            name: "testnet",
            p2pkh_prefix: [0x1d, 0x25], // tm
            p2sh_prefix: [0x1c, 0xba],  // t2
            ufvk_prefix: "uviewtest",
        }
    }

    /// Get network by type
    pub const fn from_type(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self::mainnet(),
            NetworkType::Testnet => Self::testnet(),
        }
    }
}

/// Address prefixes that only appear on mainnet.
const MAINNET_ADDRESS_PREFIXES: &[&str] = &["t1", "t3", "zs1", "zc", "u1"];

/// Address prefixes that only appear on testnet/regtest.
const TESTNET_ADDRESS_PREFIXES: &[&str] = &["tm", "t2", "ztestsapling", "zt", "utest"];

impl NetworkType {
    /// Lowercase name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }

    /// Network parameters for this type
    pub const fn params(&self) -> Network {
        Network::from_type(*self)
    }

    /// Classify a single encoded address by its prefix.
    ///
    /// Testnet prefixes are checked first because `ztestsapling` and `utest`
    /// would otherwise be shadowed by shorter mainnet prefixes.
    pub fn from_address(address: &str) -> Option<Self> {
        if TESTNET_ADDRESS_PREFIXES.iter().any(|p| address.starts_with(p)) {
            return Some(Self::Testnet);
        }
        if MAINNET_ADDRESS_PREFIXES.iter().any(|p| address.starts_with(p)) {
            return Some(Self::Mainnet);
        }
        None
    }

    /// Infer the network from a set of observed addresses.
    ///
    /// Returns testnet only when every classifiable address is a testnet
    /// address. No evidence, or conflicting evidence, yields mainnet.
    pub fn infer_from_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mainnet = 0usize;
        let mut testnet = 0usize;
        for address in addresses {
            match Self::from_address(address.as_ref()) {
                Some(Self::Mainnet) => mainnet += 1,
                Some(Self::Testnet) => testnet += 1,
                None => {}
            }
        }

        if testnet > 0 && mainnet == 0 {
            Self::Testnet
        } else {
            Self::Mainnet
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" | "regtest" => Ok(Self::Testnet),
            other => Err(Error::InvalidNetwork(other.to_string())),
        }
    }
}
