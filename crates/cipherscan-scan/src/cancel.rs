//! Cancellation handle for in-flight scans.

use crate::worker::WorkerRequest;
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Cancellation handle that can be cloned and shared across tasks.
///
/// Cancelling broadcasts [`WorkerRequest::Cancel`] to every worker of the
/// coordinator that issued the handle; it applies to whichever scan is in
/// flight at that moment and is a no-op when the pool is idle. Workers stop at
/// their next sub-chunk boundary and the scan resolves with the matches found
/// so far.
#[derive(Clone)]
pub struct ScanCancelHandle {
    senders: Arc<[Sender<WorkerRequest>]>,
}

impl ScanCancelHandle {
    pub(crate) fn new(senders: Vec<Sender<WorkerRequest>>) -> Self {
        Self {
            senders: senders.into(),
        }
    }

    /// Request cancellation.
    ///
    /// Workers that already exited are skipped.
    pub fn cancel(&self) {
        tracing::debug!("Cancelling scan on {} workers", self.senders.len());
        for sender in self.senders.iter() {
            let _ = sender.send(WorkerRequest::Cancel);
        }
    }
}

impl std::fmt::Debug for ScanCancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCancelHandle")
            .field("workers", &self.senders.len())
            .finish()
    }
}
