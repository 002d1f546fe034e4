//! Parallel birthday scan over a fixed worker pool
//!
//! The coordinator splits a scan's compact blocks into one contiguous chunk
//! per worker, folds the workers' progress reports into a single stream and
//! merges their matches once every worker has finished.

use crate::cancel::ScanCancelHandle;
use crate::compact_formats::{CompactBlock, MatchingTransaction};
use crate::config::ScanConfig;
use crate::primitive::{self, DecryptorLoader};
use crate::progress::{aggregate, ScanProgress, WorkerSlot};
use crate::worker::{WorkerEvent, WorkerHandle, WorkerRequest, WorkerResponse};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Outcome of a scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// Matches deduplicated by txid, highest block first
    pub matches: Vec<MatchingTransaction>,
    /// Final aggregate progress
    pub progress: ScanProgress,
    /// The scan was cancelled and `matches` is partial
    pub cancelled: bool,
    /// Wall-clock duration
    pub duration: Duration,
}

/// Owns the worker pool and runs one scan at a time
pub struct ScanCoordinator {
    config: ScanConfig,
    workers: Vec<WorkerHandle>,
    slots: Vec<WorkerSlot>,
    responses: UnboundedReceiver<WorkerResponse>,
    next_job_id: u64,
    /// A scan future was dropped before it resolved
    in_flight: bool,
}

impl ScanCoordinator {
    /// Create a pool using the process-wide decryptor loader
    pub fn new(config: ScanConfig) -> Result<Self> {
        Self::with_loader(config, primitive::loader())
    }

    /// Create a pool whose workers load their primitive from `loader`
    pub fn with_loader(config: ScanConfig, loader: Arc<dyn DecryptorLoader>) -> Result<Self> {
        let worker_count = config.worker_count();
        let (response_tx, responses) = mpsc::unbounded_channel();

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let handle = WorkerHandle::spawn(
                index,
                config.sub_chunk_size(),
                loader.clone(),
                response_tx.clone(),
            )
            .map_err(|e| Error::WorkerPool(format!("failed to spawn worker {}: {}", index, e)))?;
            workers.push(handle);
        }

        tracing::info!(
            "Scan pool started with {} workers (sub-chunk {} blocks)",
            worker_count,
            config.sub_chunk_size()
        );

        Ok(Self {
            config,
            workers,
            slots: vec![WorkerSlot::default(); worker_count],
            responses,
            next_job_id: 1,
            in_flight: false,
        })
    }

    /// Number of workers in the pool
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Pool configuration
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Per-worker bookkeeping for the current or last scan
    pub fn slots(&self) -> &[WorkerSlot] {
        &self.slots
    }

    /// Handle that cancels the in-flight scan from another task
    pub fn cancel_handle(&self) -> ScanCancelHandle {
        ScanCancelHandle::new(self.workers.iter().map(WorkerHandle::sender).collect())
    }

    /// Scan `blocks` for transactions addressed to `viewing_key`
    pub async fn scan(&mut self, blocks: Vec<CompactBlock>, viewing_key: &str) -> Result<ScanResult> {
        self.scan_with_progress(blocks, viewing_key, |_| {}).await
    }

    /// Scan, invoking `on_progress` with the aggregate after every worker report
    pub async fn scan_with_progress<F>(
        &mut self,
        blocks: Vec<CompactBlock>,
        viewing_key: &str,
        mut on_progress: F,
    ) -> Result<ScanResult>
    where
        F: FnMut(&ScanProgress),
    {
        if viewing_key.trim().is_empty() {
            return Err(Error::InvalidMessage("missing viewing key".to_string()));
        }

        let started = Instant::now();
        if self.in_flight {
            tracing::warn!("Previous scan was abandoned; cancelling its workers");
            self.broadcast_cancel();
        }

        let job_id = self.next_job_id;
        self.next_job_id += 1;
        let total_blocks = blocks.len() as u64;
        tracing::info!(
            "Starting scan {} over {} blocks with {} workers",
            job_id,
            total_blocks,
            self.workers.len()
        );

        self.in_flight = true;
        self.dispatch(job_id, blocks, viewing_key)?;

        while !self.slots.iter().all(|slot| slot.state.is_finished()) {
            let response = self
                .responses
                .recv()
                .await
                .ok_or_else(|| Error::WorkerPool("all workers exited".to_string()))?;

            if response.job_id != job_id {
                tracing::warn!(
                    "Discarding stale message from worker {} for job {}",
                    response.worker,
                    response.job_id
                );
                continue;
            }
            let worker = response.worker;
            let slot = self.slots.get_mut(worker).ok_or_else(|| {
                Error::InvalidMessage(format!("response from unknown worker {}", worker))
            })?;

            match response.event {
                WorkerEvent::Progress {
                    blocks_processed,
                    matches_found,
                    ..
                } => {
                    slot.record_progress(blocks_processed, matches_found);
                    on_progress(&aggregate(&self.slots, total_blocks));
                }
                WorkerEvent::Result {
                    matching_txs,
                    cancelled,
                } => {
                    tracing::debug!(
                        "Worker {} finished with {} matches{}",
                        worker,
                        matching_txs.len(),
                        if cancelled { " (cancelled)" } else { "" }
                    );
                    slot.finish(matching_txs, cancelled);
                }
                WorkerEvent::Error { error } => {
                    slot.fail();
                    tracing::error!("Scan {} failed on worker {}: {}", job_id, worker, error);
                    self.broadcast_cancel();
                    self.in_flight = false;
                    return Err(error);
                }
            }
        }

        self.in_flight = false;
        let progress = aggregate(&self.slots, total_blocks);
        let cancelled = self.slots.iter().any(|slot| slot.cancelled);
        let matches = merge_matches(self.slots.iter_mut().map(WorkerSlot::take_matches));
        let duration = started.elapsed();

        if cancelled {
            tracing::warn!(
                "Scan {} cancelled after {}/{} blocks with {} matches",
                job_id,
                progress.blocks_processed,
                total_blocks,
                matches.len()
            );
        } else {
            tracing::info!(
                "Scan {} finished: {} blocks, {} matches in {:?}",
                job_id,
                progress.blocks_processed,
                matches.len(),
                duration
            );
        }

        Ok(ScanResult {
            matches,
            progress,
            cancelled,
            duration,
        })
    }

    /// Split `blocks` into contiguous `ceil(N / workers)` chunks and post them.
    ///
    /// Workers left without blocks are finished immediately.
    fn dispatch(&mut self, job_id: u64, blocks: Vec<CompactBlock>, viewing_key: &str) -> Result<()> {
        let chunk_size = partition_size(blocks.len(), self.workers.len());
        let viewing_key: Arc<str> = Arc::from(viewing_key);
        let mut remaining = blocks.into_iter();

        for (index, (worker, slot)) in self.workers.iter().zip(self.slots.iter_mut()).enumerate() {
            let compact_blocks: Vec<CompactBlock> = remaining.by_ref().take(chunk_size).collect();
            slot.start(job_id, compact_blocks.len() as u64);
            if compact_blocks.is_empty() {
                slot.finish(Vec::new(), false);
                continue;
            }

            let request = WorkerRequest::Filter {
                job_id,
                compact_blocks,
                viewing_key: viewing_key.clone(),
            };
            if worker.send(request).is_err() {
                self.in_flight = false;
                return Err(Error::WorkerPool(format!("worker {} is not running", index)));
            }
        }
        Ok(())
    }

    fn broadcast_cancel(&self) {
        for worker in &self.workers {
            let _ = worker.send(WorkerRequest::Cancel);
        }
    }

    /// Stop every worker and wait for the threads to exit
    pub fn shutdown(mut self) -> Result<()> {
        tracing::info!("Shutting down scan pool");
        for worker in &self.workers {
            worker.stop();
        }
        let mut first_error = None;
        for worker in &mut self.workers {
            if let Err(e) = worker.join() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for ScanCoordinator {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.stop();
        }
    }
}

/// Chunk length that spreads `total` blocks over `workers`
pub fn partition_size(total: usize, workers: usize) -> usize {
    total.div_ceil(workers.max(1)).max(1)
}

/// Concatenate per-worker matches in worker order, keep the first occurrence
/// of each txid, then order by height, highest first. The sort is stable, so
/// same-height transactions keep their block order.
pub fn merge_matches<I>(per_worker: I) -> Vec<MatchingTransaction>
where
    I: IntoIterator<Item = Vec<MatchingTransaction>>,
{
    let mut seen = HashSet::new();
    let mut merged: Vec<MatchingTransaction> = per_worker
        .into_iter()
        .flatten()
        .filter(|m| seen.insert(m.txid.clone()))
        .collect();
    merged.sort_by(|a, b| b.height.cmp(&a.height));
    merged
}
