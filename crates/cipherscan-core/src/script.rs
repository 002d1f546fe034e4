//! scriptPubKey classification and transparent address derivation

use crate::base58::encode_check;
use cipherscan_params::{Network, NetworkType};
use serde::{Deserialize, Serialize};

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_EQUAL: u8 = 0x87;
const OP_RETURN: u8 = 0x6a;
const PUSH_20: u8 = 0x14;

/// Standard script template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    /// Pay to public key hash
    PubKeyHash,
    /// Pay to script hash
    ScriptHash,
    /// OP_RETURN data carrier
    NullData,
    /// Anything else
    NonStandard,
}

impl AddressType {
    /// Template name as shown by explorers
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PubKeyHash => "pubkeyhash",
            Self::ScriptHash => "scripthash",
            Self::NullData => "nulldata",
            Self::NonStandard => "nonstandard",
        }
    }
}

/// Result of resolving a scriptPubKey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedScript {
    /// Script template
    #[serde(rename = "type")]
    pub address_type: AddressType,
    /// Encoded transparent address, for P2PKH and P2SH only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Classify a script without deriving an address.
///
/// Returns the template and, for P2PKH/P2SH, the embedded 20-byte hash.
pub fn classify(script: &[u8]) -> (AddressType, Option<&[u8]>) {
    match script {
        [OP_DUP, OP_HASH160, PUSH_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
            (AddressType::PubKeyHash, Some(hash))
        }
        [OP_HASH160, PUSH_20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
            (AddressType::ScriptHash, Some(hash))
        }
        [OP_RETURN, ..] => (AddressType::NullData, None),
        _ => (AddressType::NonStandard, None),
    }
}

/// Resolves scriptPubKeys to display addresses for one network
#[derive(Debug, Clone)]
pub struct ScriptAddressResolver {
    network: Network,
}

impl ScriptAddressResolver {
    /// Create a resolver for the given network
    pub fn new(network_type: NetworkType) -> Self {
        Self {
            network: Network::from_type(network_type),
        }
    }

    /// Network the resolver encodes for
    pub fn network_type(&self) -> NetworkType {
        self.network.network_type
    }

    /// Resolve a script; unrecognised scripts are `nonstandard` with no address
    pub fn resolve(&self, script: &[u8]) -> ResolvedScript {
        let (address_type, hash) = classify(script);
        let prefix = match address_type {
            AddressType::PubKeyHash => Some(self.network.p2pkh_prefix),
            AddressType::ScriptHash => Some(self.network.p2sh_prefix),
            AddressType::NullData | AddressType::NonStandard => None,
        };
        let address = prefix
            .zip(hash)
            .map(|(prefix, hash)| encode_check(&prefix, hash));
        ResolvedScript {
            address_type,
            address,
        }
    }
}

impl Default for ScriptAddressResolver {
    fn default() -> Self {
        Self::new(NetworkType::Mainnet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p2pkh(hash: &[u8; 20]) -> Vec<u8> {
        let mut s = vec![OP_DUP, OP_HASH160, PUSH_20];
        s.extend_from_slice(hash);
        s.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        s
    }

    fn p2sh(hash: &[u8; 20]) -> Vec<u8> {
        let mut s = vec![OP_HASH160, PUSH_20];
        s.extend_from_slice(hash);
        s.push(OP_EQUAL);
        s
    }

    #[test]
    fn test_p2pkh_mainnet() {
        let resolved = ScriptAddressResolver::default().resolve(&p2pkh(&[0u8; 20]));
        assert_eq!(resolved.address_type, AddressType::PubKeyHash);
        assert_eq!(
            resolved.address.as_deref(),
            Some("t1Hsc1LR8yKnbbe3twRp88p6vFfC5t7DLbs")
        );
    }

    #[test]
    fn test_p2sh_testnet() {
        let resolved = ScriptAddressResolver::new(NetworkType::Testnet).resolve(&p2sh(&[0u8; 20]));
        assert_eq!(resolved.address_type, AddressType::ScriptHash);
        assert_eq!(
            resolved.address.as_deref(),
            Some("t26YoyZ1iPgiMEWL4zGUm74eVWfhyDMXzY2")
        );
    }

    #[test]
    fn test_op_return_has_no_address() {
        let resolved = ScriptAddressResolver::default().resolve(&[OP_RETURN, 0x04, 1, 2, 3, 4]);
        assert_eq!(resolved.address_type, AddressType::NullData);
        assert!(resolved.address.is_none());
    }

    #[test]
    fn test_nonstandard_scripts() {
        let resolver = ScriptAddressResolver::default();
        assert_eq!(resolver.resolve(&[]).address_type, AddressType::NonStandard);

        // P2PKH shape with a 19-byte hash
        let mut short = p2pkh(&[0u8; 20]);
        short.remove(3);
        assert_eq!(resolver.resolve(&short).address_type, AddressType::NonStandard);

        // Bare multisig-looking script
        assert_eq!(
            resolver.resolve(&[0x51, 0x21, 0x02, 0xae]).address_type,
            AddressType::NonStandard
        );
    }

    #[test]
    fn test_serialized_shape() {
        let resolved = ScriptAddressResolver::default().resolve(&[OP_RETURN]);
        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["type"], "nulldata");
        assert!(json.get("address").is_none());
    }
}
