//! Scan pool configuration

use serde::{Deserialize, Serialize};

/// Default cap on the worker pool size
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Default number of blocks trial-decrypted per batch
pub const DEFAULT_SUB_CHUNK_BLOCKS: usize = 10_000;

/// Environment override for [`ScanConfig::max_workers`]
pub const ENV_SCAN_WORKERS: &str = "CIPHERSCAN_SCAN_WORKERS";

/// Environment override for [`ScanConfig::sub_chunk_blocks`]
pub const ENV_SUB_CHUNK_BLOCKS: &str = "CIPHERSCAN_SUB_CHUNK_BLOCKS";

/// Scan pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on workers; the pool uses `min(hardware threads, max_workers)`
    pub max_workers: usize,
    /// Exact pool size, bypassing hardware detection
    pub workers: Option<usize>,
    /// Blocks per trial-decryption batch; also the cancellation granularity
    pub sub_chunk_blocks: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            workers: None,
            sub_chunk_blocks: DEFAULT_SUB_CHUNK_BLOCKS,
        }
    }
}

impl ScanConfig {
    /// Defaults with environment overrides applied.
    ///
    /// Unparseable or zero values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_usize(ENV_SCAN_WORKERS) {
            config.max_workers = n;
        }
        if let Some(n) = env_usize(ENV_SUB_CHUNK_BLOCKS) {
            config.sub_chunk_blocks = n;
        }
        config
    }

    /// Number of workers the pool will spawn
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get().min(self.max_workers))
            .max(1)
    }

    /// Sub-chunk size, never zero
    pub fn sub_chunk_size(&self) -> usize {
        self.sub_chunk_blocks.max(1)
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!("Ignoring {}={:?}: expected a positive integer", key, raw);
            None
        }
    }
}
