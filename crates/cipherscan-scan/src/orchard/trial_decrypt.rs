//! Orchard compact trial decryption using zcash_note_encryption
//!
//! Uses the 52-byte ciphertext prefix from compact blocks to detect whether an
//! action belongs to the viewing key. Value and memo are not needed here; a
//! match only marks the owning transaction.

use crate::primitive::CompactOutputRecord;
use ::orchard::{
    keys::PreparedIncomingViewingKey,
    note::{ExtractedNoteCommitment, Nullifier},
    note_encryption::{CompactAction, OrchardDomain},
};
use zcash_note_encryption::{batch, EphemeralKeyBytes, COMPACT_NOTE_SIZE};

fn hex_array<const N: usize>(hex_str: &str) -> Option<[u8; N]> {
    let bytes = hex::decode(hex_str.trim()).ok()?;
    bytes.try_into().ok()
}

/// Parse one record into a compact action and its decryption domain.
///
/// Returns `None` for wrong lengths, bad hex or non-canonical field elements.
/// Ciphertexts longer than the compact prefix are truncated to it.
pub fn parse_compact_action(record: &CompactOutputRecord) -> Option<(OrchardDomain, CompactAction)> {
    let nf_bytes: [u8; 32] = hex_array(&record.nullifier)?;
    let cmx_bytes: [u8; 32] = hex_array(&record.cmx)?;
    let epk_bytes: [u8; 32] = hex_array(&record.ephemeral_key)?;

    let ciphertext = hex::decode(record.ciphertext.trim()).ok()?;
    if ciphertext.len() < COMPACT_NOTE_SIZE {
        return None;
    }
    let mut enc_ciphertext = [0u8; COMPACT_NOTE_SIZE];
    enc_ciphertext.copy_from_slice(&ciphertext[..COMPACT_NOTE_SIZE]);

    let nullifier = Option::from(Nullifier::from_bytes(&nf_bytes))?;
    let cmx = Option::from(ExtractedNoteCommitment::from_bytes(&cmx_bytes))?;

    let action = CompactAction::from_parts(
        nullifier,
        cmx,
        EphemeralKeyBytes(epk_bytes),
        enc_ciphertext,
    );
    Some((OrchardDomain::for_compact_action(&action), action))
}

/// Indices of `records` that decrypt under any of `ivks`
pub fn batch_filter(records: &[CompactOutputRecord], ivks: &[PreparedIncomingViewingKey]) -> Vec<usize> {
    let mut positions = Vec::with_capacity(records.len());
    let mut outputs = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match parse_compact_action(record) {
            Some(output) => {
                positions.push(index);
                outputs.push(output);
            }
            None => tracing::trace!("Skipping malformed compact output {}", index),
        }
    }

    if outputs.is_empty() {
        return Vec::new();
    }

    batch::try_compact_note_decryption(ivks, &outputs)
        .into_iter()
        .zip(positions)
        .filter_map(|(result, index)| result.map(|_| index))
        .collect()
}
