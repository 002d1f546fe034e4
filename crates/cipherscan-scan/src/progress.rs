//! Scan progress tracking and per-worker bookkeeping

use crate::compact_formats::MatchingTransaction;
use serde::Serialize;
use std::time::Duration;

/// Aggregate progress across all workers of one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    /// Blocks trial-decrypted so far, summed over workers
    pub blocks_processed: u64,
    /// Matching transactions so far, summed over workers (before cross-worker dedupe)
    pub matches_found: u64,
    /// Blocks in the scan
    pub total_blocks: u64,
    /// Workers that have not yet finished
    pub workers_active: usize,
}

impl ScanProgress {
    /// Fraction complete in `[0, 1]`; an empty scan is complete
    pub fn fraction(&self) -> f64 {
        if self.total_blocks == 0 {
            return 1.0;
        }
        (self.blocks_processed as f64 / self.total_blocks as f64).min(1.0)
    }

    /// Percentage complete
    pub fn percentage(&self) -> f64 {
        self.fraction() * 100.0
    }

    /// Blocks per second over `elapsed`
    pub fn blocks_per_second(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.blocks_processed as f64 / secs
    }

    /// Estimated time remaining at the current rate
    pub fn eta(&self, elapsed: Duration) -> Option<Duration> {
        let rate = self.blocks_per_second(elapsed);
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.total_blocks.saturating_sub(self.blocks_processed);
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }
}

/// Worker lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    /// Waiting for a job
    #[default]
    Idle,
    /// Scanning its assigned chunk
    Running,
    /// Finished (completed or cancelled)
    Done,
    /// Reported an error
    Errored,
}

impl WorkerState {
    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Done => "Done",
            Self::Errored => "Errored",
        }
    }

    /// Whether the worker has stopped working on the current job
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Errored)
    }
}

/// Coordinator-side view of one worker for the current job
#[derive(Debug, Clone, Default)]
pub struct WorkerSlot {
    /// Lifecycle state
    pub state: WorkerState,
    /// Job the slot is tracking
    pub job_id: u64,
    /// Blocks assigned to the worker
    pub assigned_blocks: u64,
    /// Blocks processed, from the latest progress report
    pub blocks_processed: u64,
    /// Matches found, from the latest progress report
    pub matches_found: u64,
    /// Worker stopped early on cancellation
    pub cancelled: bool,
    matches: Vec<MatchingTransaction>,
}

impl WorkerSlot {
    /// Reset for a new job
    pub fn start(&mut self, job_id: u64, assigned_blocks: u64) {
        *self = Self {
            state: WorkerState::Running,
            job_id,
            assigned_blocks,
            ..Default::default()
        };
    }

    /// Record a progress report
    pub fn record_progress(&mut self, blocks_processed: u64, matches_found: u64) {
        self.blocks_processed = blocks_processed;
        self.matches_found = matches_found;
    }

    /// Record the terminal result
    pub fn finish(&mut self, matches: Vec<MatchingTransaction>, cancelled: bool) {
        self.matches_found = matches.len() as u64;
        self.matches = matches;
        self.cancelled = cancelled;
        self.state = WorkerState::Done;
    }

    /// Mark the worker as failed
    pub fn fail(&mut self) {
        self.state = WorkerState::Errored;
    }

    /// Move the stored matches out
    pub fn take_matches(&mut self) -> Vec<MatchingTransaction> {
        std::mem::take(&mut self.matches)
    }
}

/// Recompute aggregate progress from the slots
pub fn aggregate(slots: &[WorkerSlot], total_blocks: u64) -> ScanProgress {
    ScanProgress {
        blocks_processed: slots.iter().map(|s| s.blocks_processed).sum(),
        matches_found: slots.iter().map(|s| s.matches_found).sum(),
        total_blocks,
        workers_active: slots.iter().filter(|s| !s.state.is_finished()).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        let progress = ScanProgress {
            blocks_processed: 25,
            total_blocks: 100,
            ..Default::default()
        };
        assert_eq!(progress.fraction(), 0.25);
        assert_eq!(progress.percentage(), 25.0);
        assert_eq!(ScanProgress::default().fraction(), 1.0);
    }

    #[test]
    fn test_eta() {
        let progress = ScanProgress {
            blocks_processed: 50,
            total_blocks: 150,
            ..Default::default()
        };
        assert_eq!(
            progress.eta(Duration::from_secs(10)),
            Some(Duration::from_secs(20))
        );
        assert_eq!(ScanProgress::default().eta(Duration::from_secs(1)), None);
    }

    #[test]
    fn test_aggregate() {
        let mut slots = vec![WorkerSlot::default(); 3];
        for slot in &mut slots {
            slot.start(7, 10);
        }
        slots[0].record_progress(10, 1);
        slots[1].record_progress(4, 0);
        slots[2].finish(Vec::new(), false);

        let progress = aggregate(&slots, 30);
        assert_eq!(progress.blocks_processed, 14);
        assert_eq!(progress.matches_found, 1);
        assert_eq!(progress.workers_active, 2);
    }

    #[test]
    fn test_start_resets_slot() {
        let mut slot = WorkerSlot::default();
        slot.start(1, 5);
        slot.record_progress(5, 2);
        slot.fail();
        slot.start(2, 8);
        assert_eq!(slot.state, WorkerState::Running);
        assert_eq!(slot.blocks_processed, 0);
        assert_eq!(slot.job_id, 2);
    }
}
