//! Orchard full transaction decryption for memo extraction
//!
//! Parses the transaction with zcash_primitives (NU5 rules), then tries every
//! Orchard action with `try_note_decryption` under each prepared IVK.

use crate::primitive::DecryptedMemo;
use crate::{Error, Result};
use ::orchard::{keys::PreparedIncomingViewingKey, note_encryption::OrchardDomain};
use cipherscan_core::{decode_hex, ZATOSHIS_PER_ZEC};
use zcash_note_encryption::try_note_decryption;
use zcash_protocol::consensus::BranchId;
use zcash_primitives::transaction::Transaction;

/// Text of a 512-byte memo field.
///
/// The memo ends at the first zero byte. Empty, whitespace-only and non-UTF-8
/// memos yield `None`.
pub fn memo_text(memo: &[u8]) -> Option<String> {
    let len = memo.iter().position(|&b| b == 0).unwrap_or(memo.len());
    if len == 0 {
        return None;
    }
    let text = std::str::from_utf8(&memo[..len]).ok()?;
    if text.trim().is_empty() {
        return None;
    }
    Some(text.to_string())
}

/// Decrypt the first action carrying a readable memo
pub fn decrypt_first_memo(
    tx_hex: &str,
    ivks: &[PreparedIncomingViewingKey],
) -> Result<DecryptedMemo> {
    let tx_bytes = decode_hex(tx_hex)?;
    let tx = Transaction::read(&tx_bytes[..], BranchId::Nu5)
        .map_err(|e| Error::Decryption(format!("Failed to parse transaction: {}", e)))?;

    let bundle = tx
        .orchard_bundle()
        .ok_or_else(|| Error::Decryption("No Orchard bundle in transaction".to_string()))?;

    for (index, action) in bundle.actions().iter().enumerate() {
        let domain = OrchardDomain::for_action(action);
        for ivk in ivks {
            let Some((note, _recipient, memo)) = try_note_decryption(&domain, ivk, action) else {
                continue;
            };
            match memo_text(&memo) {
                Some(memo) => {
                    tracing::debug!("Decrypted memo from Orchard action {}", index);
                    return Ok(DecryptedMemo {
                        memo,
                        amount: note.value().inner() as f64 / ZATOSHIS_PER_ZEC,
                    });
                }
                None => tracing::trace!("Orchard action {} decrypted with empty memo", index),
            }
        }
    }

    Err(Error::Decryption(
        "No memo found or viewing key doesn't match any outputs".to_string(),
    ))
}
