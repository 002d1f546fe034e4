//! Scan worker threads
//!
//! Each worker is a named OS thread that owns one trial-decryption primitive.
//! Requests arrive on a per-worker `std::sync::mpsc` channel; responses go to
//! the coordinator over a shared `tokio::sync::mpsc` channel, tagged with the
//! worker index and job id.

use crate::compact_formats::{CompactBlock, MatchingTransaction};
use crate::primitive::{
    CompactOutputRecord, DecryptorLoader, TrialDecryptor, SAPLING_PLACEHOLDER_NULLIFIER,
};
use crate::progress::WorkerState;
use crate::{Error, Result};
use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::UnboundedSender;

/// Coordinator to worker message
#[derive(Debug)]
pub enum WorkerRequest {
    /// Trial-decrypt a chunk of compact blocks
    Filter {
        /// Scan the chunk belongs to
        job_id: u64,
        /// Contiguous slice of the scan's blocks
        compact_blocks: Vec<CompactBlock>,
        /// Viewing key to decrypt with
        viewing_key: Arc<str>,
    },
    /// Stop the current job at the next sub-chunk boundary
    Cancel,
    /// Exit the thread
    Shutdown,
}

/// Worker to coordinator message
#[derive(Debug)]
pub struct WorkerResponse {
    /// Index of the sending worker
    pub worker: usize,
    /// Job the message belongs to
    pub job_id: u64,
    /// Payload
    pub event: WorkerEvent,
}

/// Worker response payload
#[derive(Debug)]
pub enum WorkerEvent {
    /// Sent after every sub-chunk; counts are cumulative for the job
    Progress {
        /// Blocks processed so far
        blocks_processed: u64,
        /// Blocks assigned to this worker
        total_blocks: u64,
        /// Matching transactions so far
        matches_found: u64,
    },
    /// Terminal: job finished or was cancelled
    Result {
        /// Matches in block order, deduplicated by txid
        matching_txs: Vec<MatchingTransaction>,
        /// Job stopped early
        cancelled: bool,
    },
    /// Terminal: job failed
    Error {
        /// Rejected request, or a load or runtime failure tagged with the worker index
        error: Error,
    },
}

/// Coordinator-side handle to a worker thread
pub(crate) struct WorkerHandle {
    sender: Sender<WorkerRequest>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn worker `index` as thread `scan-worker-{index}`
    pub(crate) fn spawn(
        index: usize,
        sub_chunk_blocks: usize,
        loader: Arc<dyn DecryptorLoader>,
        responses: UnboundedSender<WorkerResponse>,
    ) -> Result<Self> {
        let (sender, requests) = mpsc::channel();
        let worker = ScanWorker {
            index,
            sub_chunk_blocks: sub_chunk_blocks.max(1),
            loader,
            decryptor: None,
            load_error: None,
            state: WorkerState::Idle,
            requests,
            pending: VecDeque::new(),
            responses,
        };
        let thread = thread::Builder::new()
            .name(format!("scan-worker-{}", index))
            .spawn(move || worker.run())?;
        Ok(Self {
            sender,
            thread: Some(thread),
        })
    }

    pub(crate) fn sender(&self) -> Sender<WorkerRequest> {
        self.sender.clone()
    }

    pub(crate) fn send(&self, request: WorkerRequest) -> std::result::Result<(), WorkerRequest> {
        self.sender.send(request).map_err(|e| e.0)
    }

    /// Ask the worker to stop and exit, without waiting
    pub(crate) fn stop(&self) {
        let _ = self.sender.send(WorkerRequest::Cancel);
        let _ = self.sender.send(WorkerRequest::Shutdown);
    }

    /// Wait for the thread to exit
    pub(crate) fn join(&mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|panic| Error::WorkerPool(panic_message(panic.as_ref()))),
            None => Ok(()),
        }
    }
}

/// Outcome of polling the request channel between sub-chunks
enum Interrupt {
    Continue,
    Cancel,
}

struct ScanWorker {
    index: usize,
    sub_chunk_blocks: usize,
    loader: Arc<dyn DecryptorLoader>,
    decryptor: Option<Box<dyn TrialDecryptor>>,
    load_error: Option<String>,
    state: WorkerState,
    requests: Receiver<WorkerRequest>,
    /// Requests that arrived mid-job and still need handling
    pending: VecDeque<WorkerRequest>,
    responses: UnboundedSender<WorkerResponse>,
}

impl ScanWorker {
    fn run(mut self) {
        tracing::debug!("Scan worker {} started", self.index);
        loop {
            let request = match self.pending.pop_front() {
                Some(request) => request,
                None => match self.requests.recv() {
                    Ok(request) => request,
                    Err(_) => break,
                },
            };

            match request {
                WorkerRequest::Filter {
                    job_id,
                    compact_blocks,
                    viewing_key,
                } => self.run_job(job_id, compact_blocks, &viewing_key),
                WorkerRequest::Cancel => {
                    tracing::trace!("Worker {} ignoring cancel while {}", self.index, self.state.name());
                }
                WorkerRequest::Shutdown => break,
            }
        }
        tracing::debug!("Scan worker {} exiting", self.index);
    }

    fn send(&self, job_id: u64, event: WorkerEvent) -> bool {
        self.responses
            .send(WorkerResponse {
                worker: self.index,
                job_id,
                event,
            })
            .is_ok()
    }

    fn fail(&mut self, job_id: u64, error: Error) {
        tracing::error!("{}", error);
        self.state = WorkerState::Errored;
        self.send(job_id, WorkerEvent::Error { error });
    }

    /// Load the primitive on first use. A failure is kept and reported again
    /// for every later job.
    fn ensure_loaded(&mut self) -> std::result::Result<(), String> {
        if let Some(message) = &self.load_error {
            return Err(message.clone());
        }
        if self.decryptor.is_some() {
            return Ok(());
        }

        let loader = self.loader.clone();
        let loaded = catch_unwind(AssertUnwindSafe(|| loader.load()));
        match loaded {
            Ok(Ok(decryptor)) => {
                tracing::debug!("Worker {} loaded decryptor", self.index);
                self.decryptor = Some(decryptor);
                Ok(())
            }
            Ok(Err(e)) => {
                self.load_error = Some(e.to_string());
                Err(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                self.load_error = Some(message.clone());
                Err(message)
            }
        }
    }

    fn run_job(&mut self, job_id: u64, blocks: Vec<CompactBlock>, viewing_key: &str) {
        self.state = WorkerState::Running;

        if viewing_key.trim().is_empty() {
            let error = Error::InvalidMessage("missing viewing key".to_string());
            self.fail(job_id, error);
            return;
        }

        if let Err(message) = self.ensure_loaded() {
            let worker = self.index;
            self.fail(job_id, Error::WorkerLoadFailure { worker, message });
            return;
        }

        let total_blocks = blocks.len() as u64;
        let mut blocks_processed = 0u64;
        let mut matches: Vec<MatchingTransaction> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cancelled = false;

        for chunk in blocks.chunks(self.sub_chunk_blocks) {
            if let Interrupt::Cancel = self.poll_interrupt(job_id) {
                cancelled = true;
                break;
            }

            let candidates = Candidates::collect(chunk);
            if !candidates.records.is_empty() {
                let Some(decryptor) = self.decryptor.as_deref() else {
                    break;
                };
                let filtered = catch_unwind(AssertUnwindSafe(|| {
                    decryptor.batch_filter_compact_outputs(&candidates.records, viewing_key)
                }));
                let hits = match filtered {
                    Ok(Ok(hits)) => hits,
                    Ok(Err(e)) => {
                        let worker = self.index;
                        let message = e.to_string();
                        self.fail(job_id, Error::WorkerRuntimeFailure { worker, message });
                        return;
                    }
                    Err(panic) => {
                        let worker = self.index;
                        let message = panic_message(panic.as_ref());
                        self.fail(job_id, Error::WorkerRuntimeFailure { worker, message });
                        return;
                    }
                };

                for hit in hits {
                    match candidates.owner(hit) {
                        Some(tx) if seen.insert(tx.txid.clone()) => matches.push(tx.clone()),
                        Some(_) => {}
                        None => tracing::warn!(
                            "Worker {} ignoring out-of-range match index {}",
                            self.index,
                            hit
                        ),
                    }
                }
            }

            blocks_processed += chunk.len() as u64;
            tracing::debug!(
                "Worker {} processed {}/{} blocks ({} matches)",
                self.index,
                blocks_processed,
                total_blocks,
                matches.len()
            );
            let delivered = self.send(
                job_id,
                WorkerEvent::Progress {
                    blocks_processed,
                    total_blocks,
                    matches_found: matches.len() as u64,
                },
            );
            if !delivered {
                // Coordinator is gone
                return;
            }
            thread::yield_now();
        }

        if cancelled {
            tracing::warn!(
                "Worker {} cancelled after {}/{} blocks",
                self.index,
                blocks_processed,
                total_blocks
            );
        }
        self.state = WorkerState::Done;
        self.send(
            job_id,
            WorkerEvent::Result {
                matching_txs: matches,
                cancelled,
            },
        );
    }

    /// Drain requests that arrived while scanning.
    ///
    /// `Cancel`, `Shutdown` and a `Filter` for a newer job all stop the current
    /// job; the latter two are kept for the main loop.
    fn poll_interrupt(&mut self, job_id: u64) -> Interrupt {
        loop {
            match self.requests.try_recv() {
                Ok(WorkerRequest::Cancel) => return Interrupt::Cancel,
                Ok(request @ WorkerRequest::Shutdown) => {
                    self.pending.push_back(request);
                    return Interrupt::Cancel;
                }
                Ok(request @ WorkerRequest::Filter { .. }) => {
                    let newer = matches!(&request, WorkerRequest::Filter { job_id: next, .. } if *next != job_id);
                    self.pending.push_back(request);
                    if newer {
                        return Interrupt::Cancel;
                    }
                }
                Err(TryRecvError::Empty) => return Interrupt::Continue,
                Err(TryRecvError::Disconnected) => return Interrupt::Cancel,
            }
        }
    }
}

/// Trial-decryption candidates of one sub-chunk
struct Candidates {
    records: Vec<CompactOutputRecord>,
    /// Owning transaction index for each record
    owners: Vec<usize>,
    transactions: Vec<MatchingTransaction>,
}

impl Candidates {
    fn collect(blocks: &[CompactBlock]) -> Self {
        let mut candidates = Self {
            records: Vec::new(),
            owners: Vec::new(),
            transactions: Vec::new(),
        };

        for block in blocks {
            for tx in &block.vtx {
                if tx.actions.is_empty() && tx.outputs.is_empty() {
                    continue;
                }
                let owner = candidates.transactions.len();
                candidates.transactions.push(MatchingTransaction {
                    txid: tx.hash.clone(),
                    height: block.height,
                    timestamp: block.time,
                });

                for action in &tx.actions {
                    candidates.records.push(CompactOutputRecord {
                        nullifier: action.nullifier.clone(),
                        cmx: action.cmx.clone(),
                        ephemeral_key: action.ephemeral_key.clone(),
                        ciphertext: action.ciphertext.clone(),
                    });
                    candidates.owners.push(owner);
                }
                for output in &tx.outputs {
                    candidates.records.push(CompactOutputRecord {
                        nullifier: SAPLING_PLACEHOLDER_NULLIFIER.to_string(),
                        cmx: output.cmu.clone(),
                        ephemeral_key: output.ephemeral_key.clone(),
                        ciphertext: output.ciphertext.clone(),
                    });
                    candidates.owners.push(owner);
                }
            }
        }
        candidates
    }

    fn owner(&self, record_index: usize) -> Option<&MatchingTransaction> {
        self.owners
            .get(record_index)
            .and_then(|owner| self.transactions.get(*owner))
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}
