//! Raw transaction decoding
//!
//! Parses v1 to v4 (legacy) and v5 (ZIP-225) transactions into a
//! [`ParsedTransaction`] for display. Shielded sections are walked for their
//! counts and value balances; their cryptographic contents are skipped.

use crate::cursor::{decode_hex, ByteCursor};
use crate::script::{AddressType, ScriptAddressResolver};
use crate::sha256::sha256d;
use crate::{Error, Result};
use cipherscan_params::{consensus_branch_label, version_group_label, NetworkType};
use serde::Serialize;

/// Smallest buffer the decoder will attempt to parse
pub const MIN_TX_BYTES: usize = 20;

/// Zatoshis per ZEC
pub const ZATOSHIS_PER_ZEC: f64 = 100_000_000.0;

const OVERWINTERED_FLAG: u32 = 0x8000_0000;
const VERSION_MASK: u32 = 0x7fff_ffff;
const COINBASE_INDEX: u32 = u32::MAX;

// Legacy (v4) Sapling and Sprout sizes
const LEGACY_SPEND_SIZE: u64 = 384;
const LEGACY_OUTPUT_SIZE: u64 = 948;
const JOINSPLIT_SIZE_BCTV14: u64 = 1802;
const JOINSPLIT_SIZE_GROTH16: u64 = 1698;
const JOINSPLIT_PUBKEY_SIZE: u64 = 32;
const JOINSPLIT_SIG_SIZE: u64 = 64;

// ZIP-225 sizes
const V5_SPEND_SIZE: u64 = 96;
const V5_OUTPUT_SIZE: u64 = 756;
const ORCHARD_ACTION_SIZE: u64 = 820;
const ANCHOR_SIZE: u64 = 32;
const GROTH_PROOF_SIZE: u64 = 192;
const SIGNATURE_SIZE: u64 = 64;

// Minimum encoded sizes, used to bound up-front allocations
const MIN_INPUT_SIZE: usize = 32 + 4 + 1 + 4;
const MIN_OUTPUT_SIZE: usize = 8 + 1;

fn zec(zatoshis: i64) -> f64 {
    zatoshis as f64 / ZATOSHIS_PER_ZEC
}

fn bounded_capacity(count: u64, remaining: usize, min_item: usize) -> usize {
    count.min((remaining / min_item) as u64) as usize
}

/// Transparent input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransparentInput {
    /// Previous txid in display byte order
    pub prev_txid: String,
    /// Previous output index
    pub prev_index: u32,
    /// Unlocking script (non-coinbase inputs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_sig: Option<String>,
    /// Coinbase data (coinbase inputs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coinbase: Option<String>,
    /// Sequence number
    pub sequence: u32,
}

impl TransparentInput {
    /// Whether this input spends the null outpoint
    pub fn is_coinbase(&self) -> bool {
        self.coinbase.is_some()
    }
}

/// Transparent output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransparentOutput {
    /// Value in ZEC
    pub value: f64,
    /// Value in zatoshis
    pub value_zat: u64,
    /// Position in the output list
    pub index: u32,
    /// Locking script as hex
    pub script_pubkey: String,
    /// Script template
    #[serde(rename = "type")]
    pub address_type: AddressType,
    /// Transparent address for P2PKH and P2SH outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Sapling bundle summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SaplingSummary {
    /// Number of spends
    pub spend_count: u64,
    /// Number of outputs
    pub output_count: u64,
    /// Net value leaving the Sapling pool, in ZEC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_balance: Option<f64>,
    /// Net value leaving the Sapling pool, in zatoshis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_balance_zat: Option<i64>,
}

impl SaplingSummary {
    /// Whether the bundle has any spends or outputs
    pub fn is_empty(&self) -> bool {
        self.spend_count == 0 && self.output_count == 0
    }
}

/// Orchard bundle flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrchardFlags {
    /// Raw flags byte
    pub raw: u8,
    /// Spends enabled (bit 0)
    pub spends_enabled: bool,
    /// Outputs enabled (bit 1)
    pub outputs_enabled: bool,
}

impl From<u8> for OrchardFlags {
    fn from(raw: u8) -> Self {
        Self {
            raw,
            spends_enabled: raw & 0x01 != 0,
            outputs_enabled: raw & 0x02 != 0,
        }
    }
}

/// Orchard bundle summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrchardSummary {
    /// Number of actions
    pub action_count: u64,
    /// Net value leaving the Orchard pool, in ZEC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_balance: Option<f64>,
    /// Net value leaving the Orchard pool, in zatoshis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_balance_zat: Option<i64>,
    /// Bundle flags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<OrchardFlags>,
    /// Aggregated proof length in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_size: Option<u64>,
}

/// Decoded transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTransaction {
    /// Transaction id for v1 to v4; v5 ids are not computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// Transaction version (1 to 5)
    pub version: u32,
    /// fOverwintered header bit
    pub overwintered: bool,
    /// Version group id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_group_id: Option<u32>,
    /// Version group name, or "Unknown"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_group: Option<&'static str>,
    /// Consensus branch id (v5 only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus_branch_id: Option<u32>,
    /// Network upgrade name, or "Unknown"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus_branch: Option<&'static str>,
    /// nLockTime
    pub lock_time: u32,
    /// nExpiryHeight (overwintered only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_height: Option<u32>,
    /// Transparent inputs
    pub inputs: Vec<TransparentInput>,
    /// Transparent outputs
    pub outputs: Vec<TransparentOutput>,
    /// Sapling summary
    pub sapling: SaplingSummary,
    /// Orchard summary
    pub orchard: OrchardSummary,
    /// Number of Sprout JoinSplits
    pub joinsplit_count: u64,
    /// Network used for address rendering
    pub network: NetworkType,
    /// Serialized size in bytes
    pub size: usize,
}

impl ParsedTransaction {
    /// A coinbase transaction has exactly one input spending the null outpoint
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Whether any Sprout, Sapling or Orchard data is present
    pub fn has_shielded_components(&self) -> bool {
        self.joinsplit_count > 0 || !self.sapling.is_empty() || self.orchard.action_count > 0
    }
}

/// Raw output before address resolution
struct RawOutput<'a> {
    value_zat: u64,
    script: &'a [u8],
}

/// Transaction decoder
///
/// Transparent addresses need a network; raw scripts do not carry one, so the
/// caller either fixes it with [`with_network`](Self::with_network) or supplies
/// addresses observed elsewhere via
/// [`with_observed_addresses`](Self::with_observed_addresses). Without either
/// the decoder renders mainnet addresses.
#[derive(Debug, Clone, Default)]
pub struct TransactionDecoder {
    network: Option<NetworkType>,
    observed_addresses: Vec<String>,
}

impl TransactionDecoder {
    /// Decoder with no network evidence
    pub fn new() -> Self {
        Self::default()
    }

    /// Render addresses for a fixed network
    pub fn with_network(mut self, network: NetworkType) -> Self {
        self.network = Some(network);
        self
    }

    /// Infer the network from addresses reported alongside the transaction
    pub fn with_observed_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observed_addresses
            .extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Network that will be used for address rendering
    pub fn network(&self) -> NetworkType {
        self.network
            .unwrap_or_else(|| NetworkType::infer_from_addresses(&self.observed_addresses))
    }

    /// Decode a hex-encoded transaction
    pub fn decode_hex(&self, hex: &str) -> Result<ParsedTransaction> {
        let bytes = decode_hex(hex)?;
        self.decode(&bytes)
    }

    /// Decode raw transaction bytes
    pub fn decode(&self, bytes: &[u8]) -> Result<ParsedTransaction> {
        if bytes.len() < MIN_TX_BYTES {
            return Err(Error::InputTooShort {
                len: bytes.len(),
                min: MIN_TX_BYTES,
            });
        }

        let mut cursor = ByteCursor::new(bytes);
        let header = cursor.read_u32()?;
        let overwintered = header & OVERWINTERED_FLAG != 0;
        let version = header & VERSION_MASK;
        if !(1..=5).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }

        let (mut tx, raw_outputs) = if version == 5 {
            if !overwintered {
                tracing::warn!("v5 transaction without fOverwintered set");
            }
            decode_v5(&mut cursor, overwintered)?
        } else {
            decode_legacy(&mut cursor, version, overwintered)?
        };

        if !cursor.is_exhausted() {
            return Err(Error::TrailingBytes {
                consumed: cursor.position(),
                total: bytes.len(),
            });
        }

        let network = self.network();
        let resolver = ScriptAddressResolver::new(network);
        tx.outputs = raw_outputs
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let resolved = resolver.resolve(raw.script);
                TransparentOutput {
                    value: raw.value_zat as f64 / ZATOSHIS_PER_ZEC,
                    value_zat: raw.value_zat,
                    index: index as u32,
                    script_pubkey: hex::encode(raw.script),
                    address_type: resolved.address_type,
                    address: resolved.address,
                }
            })
            .collect();
        tx.network = network;
        tx.size = bytes.len();
        if version < 5 {
            let mut txid = sha256d(bytes);
            txid.reverse();
            tx.txid = Some(hex::encode(txid));
        }

        tracing::debug!(
            version,
            size = tx.size,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            "decoded transaction"
        );
        Ok(tx)
    }
}

/// Decode a hex transaction with default settings
pub fn decode_transaction(hex: &str) -> Result<ParsedTransaction> {
    TransactionDecoder::new().decode_hex(hex)
}

fn empty_transaction(version: u32, overwintered: bool) -> ParsedTransaction {
    ParsedTransaction {
        txid: None,
        version,
        overwintered,
        version_group_id: None,
        version_group: None,
        consensus_branch_id: None,
        consensus_branch: None,
        lock_time: 0,
        expiry_height: None,
        inputs: Vec::new(),
        outputs: Vec::new(),
        sapling: SaplingSummary::default(),
        orchard: OrchardSummary::default(),
        joinsplit_count: 0,
        network: NetworkType::default(),
        size: 0,
    }
}

fn decode_legacy<'a>(
    cursor: &mut ByteCursor<'a>,
    version: u32,
    overwintered: bool,
) -> Result<(ParsedTransaction, Vec<RawOutput<'a>>)> {
    let mut tx = empty_transaction(version, overwintered);

    if overwintered {
        let group = cursor.read_u32()?;
        tx.version_group_id = Some(group);
        tx.version_group = Some(version_group_label(group));
    }

    tx.inputs = read_inputs(cursor)?;
    let outputs = read_outputs(cursor)?;
    tx.lock_time = cursor.read_u32()?;
    if overwintered {
        tx.expiry_height = Some(cursor.read_u32()?);
    }

    let has_sapling = version == 4 && overwintered;
    if has_sapling {
        let balance = cursor.read_i64()?;
        let spends = cursor.read_compact_size()?;
        cursor.skip_items(spends, LEGACY_SPEND_SIZE)?;
        let outs = cursor.read_compact_size()?;
        cursor.skip_items(outs, LEGACY_OUTPUT_SIZE)?;
        tx.sapling = SaplingSummary {
            spend_count: spends,
            output_count: outs,
            value_balance: Some(zec(balance)),
            value_balance_zat: Some(balance),
        };
    }

    if version >= 2 {
        let joinsplits = cursor.read_compact_size()?;
        let size = if version >= 4 {
            JOINSPLIT_SIZE_GROTH16
        } else {
            JOINSPLIT_SIZE_BCTV14
        };
        cursor.skip_items(joinsplits, size)?;
        if joinsplits > 0 {
            cursor.skip(JOINSPLIT_PUBKEY_SIZE + JOINSPLIT_SIG_SIZE)?;
        }
        tx.joinsplit_count = joinsplits;
    }

    if has_sapling && !tx.sapling.is_empty() {
        cursor.skip(SIGNATURE_SIZE)?;
    }

    Ok((tx, outputs))
}

fn decode_v5<'a>(
    cursor: &mut ByteCursor<'a>,
    overwintered: bool,
) -> Result<(ParsedTransaction, Vec<RawOutput<'a>>)> {
    let mut tx = empty_transaction(5, overwintered);

    let group = cursor.read_u32()?;
    tx.version_group_id = Some(group);
    tx.version_group = Some(version_group_label(group));
    let branch = cursor.read_u32()?;
    tx.consensus_branch_id = Some(branch);
    tx.consensus_branch = Some(consensus_branch_label(branch));
    tx.lock_time = cursor.read_u32()?;
    tx.expiry_height = Some(cursor.read_u32()?);

    tx.inputs = read_inputs(cursor)?;
    let outputs = read_outputs(cursor)?;
    tx.sapling = read_v5_sapling(cursor)?;
    tx.orchard = read_orchard(cursor)?;

    Ok((tx, outputs))
}

fn read_v5_sapling(cursor: &mut ByteCursor<'_>) -> Result<SaplingSummary> {
    let spends = cursor.read_compact_size()?;
    cursor.skip_items(spends, V5_SPEND_SIZE)?;
    let outputs = cursor.read_compact_size()?;
    cursor.skip_items(outputs, V5_OUTPUT_SIZE)?;

    let mut summary = SaplingSummary {
        spend_count: spends,
        output_count: outputs,
        ..Default::default()
    };
    if summary.is_empty() {
        return Ok(summary);
    }

    let balance = cursor.read_i64()?;
    summary.value_balance = Some(zec(balance));
    summary.value_balance_zat = Some(balance);
    if spends > 0 {
        cursor.skip(ANCHOR_SIZE)?;
    }
    cursor.skip_items(spends, GROTH_PROOF_SIZE)?;
    cursor.skip_items(spends, SIGNATURE_SIZE)?;
    cursor.skip_items(outputs, GROTH_PROOF_SIZE)?;
    cursor.skip(SIGNATURE_SIZE)?;
    Ok(summary)
}

fn read_orchard(cursor: &mut ByteCursor<'_>) -> Result<OrchardSummary> {
    let actions = cursor.read_compact_size()?;
    cursor.skip_items(actions, ORCHARD_ACTION_SIZE)?;
    if actions == 0 {
        return Ok(OrchardSummary::default());
    }

    let flags = OrchardFlags::from(cursor.read_u8()?);
    let balance = cursor.read_i64()?;
    cursor.skip(ANCHOR_SIZE)?;
    let proof_size = cursor.read_compact_size()?;
    cursor.skip(proof_size)?;
    cursor.skip_items(actions, SIGNATURE_SIZE)?;
    cursor.skip(SIGNATURE_SIZE)?;

    Ok(OrchardSummary {
        action_count: actions,
        value_balance: Some(zec(balance)),
        value_balance_zat: Some(balance),
        flags: Some(flags),
        proof_size: Some(proof_size),
    })
}

fn read_inputs(cursor: &mut ByteCursor<'_>) -> Result<Vec<TransparentInput>> {
    let count = cursor.read_compact_size()?;
    let mut inputs = Vec::with_capacity(bounded_capacity(count, cursor.remaining(), MIN_INPUT_SIZE));
    for _ in 0..count {
        let prev_hash = cursor.read_hash()?;
        let prev_index = cursor.read_u32()?;
        let script = hex::encode(cursor.read_var_bytes()?);
        let sequence = cursor.read_u32()?;

        let is_coinbase = prev_index == COINBASE_INDEX && prev_hash.iter().all(|b| *b == 0);
        let (script_sig, coinbase) = if is_coinbase {
            (None, Some(script))
        } else {
            (Some(script), None)
        };
        inputs.push(TransparentInput {
            prev_txid: hex::encode(prev_hash),
            prev_index,
            script_sig,
            coinbase,
            sequence,
        });
    }
    Ok(inputs)
}

fn read_outputs<'a>(cursor: &mut ByteCursor<'a>) -> Result<Vec<RawOutput<'a>>> {
    let count = cursor.read_compact_size()?;
    let mut outputs =
        Vec::with_capacity(bounded_capacity(count, cursor.remaining(), MIN_OUTPUT_SIZE));
    for _ in 0..count {
        let value_zat = cursor.read_u64()?;
        let script = cursor.read_var_bytes()?;
        outputs.push(RawOutput { value_zat, script });
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bitcoin genesis coinbase; byte-compatible with the Zcash v1 layout.
    const GENESIS_COINBASE: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

    #[test]
    fn test_v1_coinbase() {
        let tx = decode_transaction(GENESIS_COINBASE).unwrap();
        assert_eq!(tx.version, 1);
        assert!(!tx.overwintered);
        assert_eq!(tx.size, 204);
        assert!(tx.is_coinbase());
        assert_eq!(
            tx.txid.as_deref(),
            Some("4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b")
        );
        assert_eq!(tx.inputs[0].prev_index, u32::MAX);
        assert!(tx.inputs[0].script_sig.is_none());
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value_zat, 5_000_000_000);
        assert_eq!(tx.outputs[0].value, 50.0);
        // Pay-to-pubkey is not a recognised template
        assert_eq!(tx.outputs[0].address_type, AddressType::NonStandard);
        assert!(tx.outputs[0].address.is_none());
        assert!(!tx.has_shielded_components());
        assert!(tx.version_group.is_none());
        assert!(tx.expiry_height.is_none());
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let upper = GENESIS_COINBASE.to_uppercase();
        assert_eq!(
            decode_transaction(&upper).unwrap(),
            decode_transaction(GENESIS_COINBASE).unwrap()
        );
    }

    #[test]
    fn test_short_input_rejected_before_parsing() {
        assert_eq!(
            decode_transaction("0400008085202f89"),
            Err(Error::InputTooShort { len: 8, min: 20 })
        );
    }

    #[test]
    fn test_unsupported_versions() {
        let mut bytes = vec![0u8; 32];
        assert_eq!(
            TransactionDecoder::new().decode(&bytes),
            Err(Error::UnsupportedVersion(0))
        );
        bytes[0] = 6;
        bytes[3] = 0x80;
        assert_eq!(
            TransactionDecoder::new().decode(&bytes),
            Err(Error::UnsupportedVersion(6))
        );
    }

    #[test]
    fn test_trailing_byte_rejected() {
        let padded = format!("{GENESIS_COINBASE}00");
        assert_eq!(
            decode_transaction(&padded),
            Err(Error::TrailingBytes {
                consumed: 204,
                total: 205
            })
        );
    }

    #[test]
    fn test_truncated_reports_offset() {
        let cut = &GENESIS_COINBASE[..GENESIS_COINBASE.len() - 8];
        let err = decode_transaction(cut).unwrap_err();
        assert_eq!(
            err,
            Error::TruncatedInput {
                offset: 200,
                needed: 4,
                remaining: 0
            }
        );
    }

    #[test]
    fn test_orchard_flags() {
        let flags = OrchardFlags::from(0x03);
        assert!(flags.spends_enabled && flags.outputs_enabled);
        let flags = OrchardFlags::from(0x02);
        assert!(!flags.spends_enabled && flags.outputs_enabled);
    }
}
