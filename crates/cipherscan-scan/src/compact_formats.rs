//! Compact block JSON types
//!
//! These mirror the compact block shape served by the explorer API: the
//! lightwalletd `CompactBlock` with byte fields as hex strings and camelCase
//! names. Only the data needed for trial decryption is kept.
//!
//! Heights and times arrive either as JSON numbers or as decimal strings,
//! depending on the indexer that produced them; both are accepted.

#![allow(missing_docs)] // Wire fields don't need individual docs

use crate::Result;
use serde::{Deserialize, Deserializer, Serialize};

/// Compact block: height, hash, time and the shielded parts of its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactBlock {
    #[serde(deserialize_with = "number_or_string")]
    pub height: u64,
    #[serde(default)]
    pub hash: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub time: u64,
    #[serde(default)]
    pub vtx: Vec<CompactTx>,
}

/// Compact transaction containing only shielded outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactTx {
    #[serde(alias = "txid")]
    pub hash: String,
    #[serde(default)]
    pub actions: Vec<CompactOrchardAction>,
    #[serde(default)]
    pub outputs: Vec<CompactSaplingOutput>,
}

/// Compact Orchard action (nullifier, cmx, ephemeral key, ciphertext prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactOrchardAction {
    pub nullifier: String,
    pub cmx: String,
    pub ephemeral_key: String,
    pub ciphertext: String,
}

/// Compact Sapling output (cmu, ephemeral key, ciphertext prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactSaplingOutput {
    pub cmu: String,
    pub ephemeral_key: String,
    pub ciphertext: String,
}

impl CompactBlock {
    /// Number of shielded outputs (Orchard actions and Sapling outputs)
    pub fn output_count(&self) -> usize {
        self.vtx
            .iter()
            .map(|tx| tx.actions.len() + tx.outputs.len())
            .sum()
    }
}

/// Transaction that trial-decrypted under the scan's viewing key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchingTransaction {
    pub txid: String,
    pub height: u64,
    pub timestamp: u64,
}

/// Parse a JSON array of compact blocks
pub fn parse_compact_blocks(json: &str) -> Result<Vec<CompactBlock>> {
    Ok(serde_json::from_str(json)?)
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
