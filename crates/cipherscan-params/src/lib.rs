//! Zcash network parameters and protocol identifiers
//!
//! This crate provides the network identities (address prefixes, key
//! prefixes), network inference from observed addresses, and the known
//! transaction version-group and consensus-branch identifiers used when
//! labeling decoded transactions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consensus;
pub mod network;

pub use consensus::{
    consensus_branch_label, version_group_label, NetworkUpgrade, NU5_VERSION_GROUP_ID,
    OVERWINTER_VERSION_GROUP_ID, SAPLING_VERSION_GROUP_ID, UNKNOWN_LABEL,
};
pub use network::{Network, NetworkType};

/// Error types for parameter operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid network specified
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),
}

/// Result type for parameter operations
pub type Result<T> = std::result::Result<T, Error>;
