//! Scan coordinator tests against a mock trial decryptor

use cipherscan_scan::{
    CompactBlock, CompactOrchardAction, CompactOutputRecord, CompactSaplingOutput, CompactTx,
    DecryptedMemo, DecryptorLoader, Error, ScanConfig, ScanCoordinator, ScanProgress,
    TrialDecryptor, WorkerState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock primitive
// ============================================================================

/// Ciphertext prefix the mock treats as decryptable
const MATCH: &str = "01";
/// Ciphertext that makes the mock return an error
const FAIL: &str = "fail";
/// Ciphertext that makes the mock panic
const PANIC: &str = "panic";

#[derive(Default)]
struct MockLoader {
    fail_load: bool,
    loads: Arc<AtomicUsize>,
    /// Each batch call consumes one permit when set
    gate: Option<Arc<Mutex<Receiver<()>>>>,
}

impl DecryptorLoader for MockLoader {
    fn load(&self) -> cipherscan_scan::Result<Box<dyn TrialDecryptor>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(Error::Decryption("mock primitive unavailable".to_string()));
        }
        Ok(Box::new(MockDecryptor {
            gate: self.gate.clone(),
        }))
    }
}

struct MockDecryptor {
    gate: Option<Arc<Mutex<Receiver<()>>>>,
}

impl TrialDecryptor for MockDecryptor {
    fn batch_filter_compact_outputs(
        &self,
        records: &[CompactOutputRecord],
        _viewing_key: &str,
    ) -> cipherscan_scan::Result<Vec<usize>> {
        if let Some(gate) = &self.gate {
            gate.lock().unwrap().recv().unwrap();
        }
        let mut hits = Vec::new();
        for (index, record) in records.iter().enumerate() {
            match record.ciphertext.as_str() {
                FAIL => return Err(Error::Decryption("mock failure".to_string())),
                PANIC => panic!("mock panic"),
                c if c.starts_with(MATCH) => hits.push(index),
                _ => {}
            }
        }
        Ok(hits)
    }

    fn decrypt_memo(&self, _tx_hex: &str, _viewing_key: &str) -> cipherscan_scan::Result<DecryptedMemo> {
        Err(Error::Decryption("not supported by mock".to_string()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn action(ciphertext: &str) -> CompactOrchardAction {
    CompactOrchardAction {
        nullifier: "11".repeat(32),
        cmx: "22".repeat(32),
        ephemeral_key: "33".repeat(32),
        ciphertext: ciphertext.to_string(),
    }
}

fn sapling_output(ciphertext: &str) -> CompactSaplingOutput {
    CompactSaplingOutput {
        cmu: "44".repeat(32),
        ephemeral_key: "55".repeat(32),
        ciphertext: ciphertext.to_string(),
    }
}

fn orchard_tx(txid: &str, ciphertext: &str) -> CompactTx {
    CompactTx {
        hash: txid.to_string(),
        actions: vec![action(ciphertext)],
        outputs: Vec::new(),
    }
}

fn block(height: u64, vtx: Vec<CompactTx>) -> CompactBlock {
    CompactBlock {
        height,
        hash: format!("{:064x}", height),
        time: 1_700_000_000 + height * 75,
        vtx,
    }
}

/// `count` blocks from height 1000, each with one transaction that matches
/// when `matches(height)` holds
fn blocks(count: u64, matches: impl Fn(u64) -> bool) -> Vec<CompactBlock> {
    (1000..1000 + count)
        .map(|h| {
            let ciphertext = if matches(h) { MATCH.repeat(52) } else { "00".repeat(52) };
            block(h, vec![orchard_tx(&format!("tx-{}", h), &ciphertext)])
        })
        .collect()
}

fn config(workers: usize, sub_chunk_blocks: usize) -> ScanConfig {
    ScanConfig {
        workers: Some(workers),
        sub_chunk_blocks,
        ..Default::default()
    }
}

fn coordinator(workers: usize, sub_chunk_blocks: usize) -> ScanCoordinator {
    ScanCoordinator::with_loader(
        config(workers, sub_chunk_blocks),
        Arc::new(MockLoader::default()),
    )
    .unwrap()
}

// ============================================================================
// Partitioning and progress
// ============================================================================

#[tokio::test]
async fn test_partition_and_progress() {
    let mut coordinator = coordinator(4, 2);
    let mut reports: Vec<ScanProgress> = Vec::new();

    let result = coordinator
        .scan_with_progress(blocks(10, |h| h % 2 == 1), "uview1mock", |p| reports.push(*p))
        .await
        .unwrap();

    // ceil(10 / 4) = 3 blocks per worker, the last one gets the remainder
    let assigned: Vec<u64> = coordinator.slots().iter().map(|s| s.assigned_blocks).collect();
    assert_eq!(assigned, [3, 3, 3, 1]);
    assert!(coordinator
        .slots()
        .iter()
        .all(|s| s.state == WorkerState::Done));

    assert!(!result.cancelled);
    assert_eq!(result.progress.blocks_processed, 10);
    assert_eq!(result.progress.total_blocks, 10);
    assert_eq!(result.progress.workers_active, 0);
    assert_eq!(result.matches.len(), 5);

    // Highest block first
    let heights: Vec<u64> = result.matches.iter().map(|m| m.height).collect();
    assert_eq!(heights, [1009, 1007, 1005, 1003, 1001]);
    assert_eq!(result.matches[0].txid, "tx-1009");
    assert_eq!(result.matches[0].timestamp, 1_700_000_000 + 1009 * 75);

    // One report per sub-chunk: workers with 3 blocks report twice, the last once
    assert_eq!(reports.len(), 7);
    assert!(reports.iter().all(|p| p.total_blocks == 10));
    assert_eq!(reports.iter().map(|p| p.blocks_processed).max(), Some(10));
}

#[tokio::test]
async fn test_more_workers_than_blocks() {
    let mut coordinator = coordinator(4, 10);
    let result = coordinator
        .scan(blocks(2, |_| true), "uview1mock")
        .await
        .unwrap();

    let assigned: Vec<u64> = coordinator.slots().iter().map(|s| s.assigned_blocks).collect();
    assert_eq!(assigned, [1, 1, 0, 0]);
    assert_eq!(result.matches.len(), 2);
    assert_eq!(result.progress.blocks_processed, 2);
}

#[tokio::test]
async fn test_empty_scan_resolves_immediately() {
    let mut coordinator = coordinator(3, 10);
    let mut calls = 0;
    let result = coordinator
        .scan_with_progress(Vec::new(), "uview1mock", |_| calls += 1)
        .await
        .unwrap();

    assert!(result.matches.is_empty());
    assert!(!result.cancelled);
    assert_eq!(result.progress, ScanProgress::default());
    assert_eq!(calls, 0);
}

// ============================================================================
// Merging
// ============================================================================

#[tokio::test]
async fn test_orchard_and_sapling_hit_counted_once() {
    let mut coordinator = coordinator(2, 10);
    let both = CompactTx {
        hash: "shared".to_string(),
        actions: vec![action(&MATCH.repeat(52))],
        outputs: vec![sapling_output(&MATCH.repeat(52)), sapling_output(&MATCH.repeat(52))],
    };
    let scan = vec![
        block(500, vec![both]),
        block(501, vec![orchard_tx("other", &"00".repeat(52))]),
    ];

    let result = coordinator.scan(scan, "uview1mock").await.unwrap();
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].txid, "shared");
}

#[tokio::test]
async fn test_duplicate_txid_across_workers_keeps_first() {
    let mut coordinator = coordinator(2, 10);
    let ciphertext = MATCH.repeat(52);
    let scan = vec![
        block(700, vec![orchard_tx("dup", &ciphertext)]),
        block(701, vec![orchard_tx("dup", &ciphertext)]),
    ];

    let result = coordinator.scan(scan, "uview1mock").await.unwrap();
    assert_eq!(result.matches.len(), 1);
    // Worker 0 saw it first, at the lower height
    assert_eq!(result.matches[0].height, 700);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_worker_error_identifies_worker() {
    let mut coordinator = coordinator(3, 10);
    let mut scan = blocks(3, |_| false);
    scan[1].vtx[0].actions[0].ciphertext = FAIL.to_string();

    let err = coordinator.scan(scan, "uview1mock").await.unwrap_err();
    assert!(matches!(err, Error::WorkerRuntimeFailure { worker: 1, .. }));
    assert_eq!(err.worker_index(), Some(1));
    assert!(err.to_string().contains("mock failure"));

    // Pool is still usable; late messages from the failed job are discarded
    let result = coordinator
        .scan(blocks(6, |_| true), "uview1mock")
        .await
        .unwrap();
    assert_eq!(result.matches.len(), 6);
}

#[tokio::test]
async fn test_primitive_panic_is_contained() {
    let mut coordinator = coordinator(2, 10);
    let mut scan = blocks(4, |_| false);
    scan[3].vtx[0].actions[0].ciphertext = PANIC.to_string();

    let err = coordinator.scan(scan, "uview1mock").await.unwrap_err();
    match err {
        Error::WorkerRuntimeFailure { worker, message } => {
            assert_eq!(worker, 1);
            assert!(message.contains("mock panic"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The panicking worker's thread survived
    let result = coordinator
        .scan(blocks(4, |_| true), "uview1mock")
        .await
        .unwrap();
    assert_eq!(result.matches.len(), 4);
}

#[tokio::test]
async fn test_load_failure_is_sticky() {
    let loads = Arc::new(AtomicUsize::new(0));
    let loader = MockLoader {
        fail_load: true,
        loads: loads.clone(),
        gate: None,
    };
    let mut coordinator = ScanCoordinator::with_loader(config(1, 10), Arc::new(loader)).unwrap();

    for _ in 0..2 {
        let err = coordinator
            .scan(blocks(3, |_| true), "uview1mock")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkerLoadFailure { worker: 0, .. }));
        assert!(err.to_string().contains("mock primitive unavailable"));
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_viewing_key_is_rejected() {
    let loads = Arc::new(AtomicUsize::new(0));
    let loader = MockLoader {
        loads: loads.clone(),
        ..Default::default()
    };
    let mut coordinator = ScanCoordinator::with_loader(config(2, 10), Arc::new(loader)).unwrap();

    for key in ["", "  \t\n"] {
        let err = coordinator
            .scan(blocks(4, |_| true), key)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)), "{err}");
        assert_eq!(err.worker_index(), None);
    }
    // Nothing reached the workers
    assert_eq!(loads.load(Ordering::SeqCst), 0);

    let result = coordinator
        .scan(blocks(4, |_| true), "uview1mock")
        .await
        .unwrap();
    assert_eq!(result.matches.len(), 4);
}

#[tokio::test]
async fn test_native_primitive_rejects_bad_key() {
    let mut coordinator = ScanCoordinator::new(config(1, 10)).unwrap();
    let err = coordinator
        .scan(blocks(1, |_| true), "zxviews1notaufvk")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WorkerRuntimeFailure { worker: 0, .. }));
    assert!(err.to_string().contains("UFVK"));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_mid_scan_returns_partial_matches() {
    let (permits, gate): (Sender<()>, Receiver<()>) = mpsc::channel();
    let loader = MockLoader {
        gate: Some(Arc::new(Mutex::new(gate))),
        ..Default::default()
    };
    let mut coordinator = ScanCoordinator::with_loader(config(1, 1), Arc::new(loader)).unwrap();
    let cancel = coordinator.cancel_handle();

    // Let three sub-chunks through, then cancel and release the worker
    for _ in 0..3 {
        permits.send(()).unwrap();
    }
    let mut cancelled_at = None;
    let result = coordinator
        .scan_with_progress(blocks(10, |_| true), "uview1mock", |p| {
            if p.blocks_processed == 3 && cancelled_at.is_none() {
                cancelled_at = Some(p.blocks_processed);
                cancel.cancel();
                for _ in 0..10 {
                    let _ = permits.send(());
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(cancelled_at, Some(3));
    assert!(result.cancelled);
    // Stops within one sub-chunk of the request
    assert!((3..=4).contains(&result.progress.blocks_processed));
    assert_eq!(result.matches.len() as u64, result.progress.blocks_processed);
    assert!(result.matches.len() < 10);
}

#[tokio::test]
async fn test_cancel_while_idle_is_ignored() {
    let mut coordinator = coordinator(2, 10);
    coordinator.cancel_handle().cancel();

    let result = coordinator
        .scan(blocks(4, |_| true), "uview1mock")
        .await
        .unwrap();
    assert!(!result.cancelled);
    assert_eq!(result.matches.len(), 4);
}

#[tokio::test]
async fn test_abandoned_scan_does_not_leak_into_next() {
    let mut coordinator = coordinator(2, 1);

    // Drop the first scan before it resolves
    let abandoned = tokio::time::timeout(
        std::time::Duration::from_millis(1),
        coordinator.scan(blocks(2_000, |_| true), "uview1mock"),
    )
    .await;
    drop(abandoned);

    let result = coordinator
        .scan(blocks(4, |h| h == 1001), "uview1mock")
        .await
        .unwrap();
    assert!(!result.cancelled);
    assert_eq!(result.progress.blocks_processed, 4);
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].txid, "tx-1001");
}

#[tokio::test]
async fn test_shutdown_joins_workers() {
    let mut coordinator = coordinator(3, 10);
    coordinator
        .scan(blocks(5, |_| true), "uview1mock")
        .await
        .unwrap();
    assert_eq!(coordinator.worker_count(), 3);
    coordinator.shutdown().unwrap();
}
