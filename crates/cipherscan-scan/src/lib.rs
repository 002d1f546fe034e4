//! Parallel compact-block trial decryption
//!
//! Provides a birthday scan over compact blocks: a fixed pool of worker
//! threads trial-decrypts Orchard actions and Sapling outputs against a
//! viewing key, with aggregated progress, cooperative cancellation and a
//! merged, deduplicated result.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::result_large_err)]

pub mod cancel;
pub mod compact_formats;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod orchard;
pub mod primitive;
pub mod progress;
pub mod worker;

pub use cancel::ScanCancelHandle;
pub use compact_formats::{
    parse_compact_blocks, CompactBlock, CompactOrchardAction, CompactSaplingOutput, CompactTx,
    MatchingTransaction,
};
pub use config::{ScanConfig, DEFAULT_MAX_WORKERS, DEFAULT_SUB_CHUNK_BLOCKS};
pub use coordinator::{merge_matches, partition_size, ScanCoordinator, ScanResult};
pub use error::{Error, Result};
pub use crate::orchard::{NativeLoader, NativeTrialDecryptor};
pub use primitive::{
    detect_key_type, install_loader, loader, CompactOutputRecord, DecryptedMemo, DecryptorLoader,
    KeyType, TrialDecryptor,
};
pub use progress::{ScanProgress, WorkerSlot, WorkerState};
pub use worker::{WorkerEvent, WorkerRequest, WorkerResponse};
