//! Native Orchard trial-decryption primitive
//!
//! Viewing keys are unified full viewing keys; only their Orchard component
//! is used. Both the external and internal (change) scopes are tried.

pub mod full_decrypt;
pub mod trial_decrypt;

use crate::primitive::{CompactOutputRecord, DecryptedMemo, DecryptorLoader, TrialDecryptor};
use crate::{Error, Result};
use ::orchard::keys::{FullViewingKey, PreparedIncomingViewingKey, Scope};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use zcash_address::unified::{Container, Encoding, Fvk, Ufvk};

/// Prepared incoming viewing keys for one UFVK
pub struct OrchardViewingKeys {
    /// External then internal scope
    pub ivks: [PreparedIncomingViewingKey; 2],
}

impl OrchardViewingKeys {
    /// Parse a unified full viewing key and prepare its Orchard IVKs
    pub fn from_ufvk(encoded: &str) -> Result<Self> {
        let (_network, ufvk) = Ufvk::decode(encoded.trim())
            .map_err(|e| Error::InvalidViewingKey(format!("UFVK decode failed: {}", e)))?;

        let fvk_bytes = ufvk
            .items()
            .into_iter()
            .find_map(|item| match item {
                Fvk::Orchard(data) => Some(data),
                _ => None,
            })
            .ok_or_else(|| Error::InvalidViewingKey("No Orchard FVK found in UFVK".to_string()))?;

        let fvk = FullViewingKey::from_bytes(&fvk_bytes)
            .ok_or_else(|| Error::InvalidViewingKey("Orchard FVK parse failed".to_string()))?;

        Ok(Self {
            ivks: [Scope::External, Scope::Internal]
                .map(|scope| PreparedIncomingViewingKey::new(&fvk.to_ivk(scope))),
        })
    }
}

/// Orchard decryptor backed by `orchard` and `zcash_note_encryption`
#[derive(Default)]
pub struct NativeTrialDecryptor {
    keys: Mutex<HashMap<String, Arc<OrchardViewingKeys>>>,
}

impl NativeTrialDecryptor {
    /// Create a decryptor with an empty key cache
    pub fn new() -> Self {
        Self::default()
    }

    fn keys_for(&self, viewing_key: &str) -> Result<Arc<OrchardViewingKeys>> {
        if let Some(keys) = self.keys.lock().get(viewing_key) {
            return Ok(keys.clone());
        }
        let keys = Arc::new(OrchardViewingKeys::from_ufvk(viewing_key)?);
        self.keys
            .lock()
            .insert(viewing_key.to_string(), keys.clone());
        Ok(keys)
    }
}

impl TrialDecryptor for NativeTrialDecryptor {
    fn batch_filter_compact_outputs(
        &self,
        records: &[CompactOutputRecord],
        viewing_key: &str,
    ) -> Result<Vec<usize>> {
        let keys = self.keys_for(viewing_key)?;
        Ok(trial_decrypt::batch_filter(records, &keys.ivks))
    }

    fn decrypt_memo(&self, tx_hex: &str, viewing_key: &str) -> Result<DecryptedMemo> {
        let keys = self.keys_for(viewing_key)?;
        full_decrypt::decrypt_first_memo(tx_hex, &keys.ivks)
    }
}

/// Loader for [`NativeTrialDecryptor`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLoader;

impl DecryptorLoader for NativeLoader {
    fn load(&self) -> Result<Box<dyn TrialDecryptor>> {
        Ok(Box::new(NativeTrialDecryptor::new()))
    }
}
