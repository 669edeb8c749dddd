//! # Partition Metrics
//!
//! Counters owned by a single partition worker. Never shared between tasks;
//! the engine receives a copy in the [`PartitionSummary`] when the worker
//! terminates.

use serde::Serialize;

use crate::messaging::PartitionId;
use crate::orchestration::flush::{FlushOutcome, FlushReport, FlushTrigger};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionMetrics {
    /// Messages admitted into the window
    pub messages_ingested: u64,
    pub size_flushes: u64,
    pub time_flushes: u64,
    pub drain_flushes: u64,
    pub messages_decoded: u64,
    /// Messages skipped because they failed to decode
    pub messages_skipped: u64,
    pub batches_committed: u64,
    pub process_failures: u64,
    pub checkpoint_failures: u64,
}

impl PartitionMetrics {
    pub fn record_ingest(&mut self) {
        self.messages_ingested += 1;
    }

    pub fn record_flush(&mut self, report: &FlushReport) {
        match report.trigger {
            FlushTrigger::Size => self.size_flushes += 1,
            FlushTrigger::Time => self.time_flushes += 1,
            FlushTrigger::Drain => self.drain_flushes += 1,
        }

        self.messages_decoded += report.decoded_count as u64;
        self.messages_skipped += report.skipped_count as u64;

        match report.outcome {
            FlushOutcome::Committed { .. } => self.batches_committed += 1,
            FlushOutcome::ProcessFailed { .. } => self.process_failures += 1,
            FlushOutcome::CheckpointFailed { .. } => self.checkpoint_failures += 1,
        }
    }

    pub fn total_flushes(&self) -> u64 {
        self.size_flushes + self.time_flushes + self.drain_flushes
    }
}

/// Final state of a partition worker, returned when it terminates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    pub partition: PartitionId,
    /// Last offset whose batch was processed and checkpointed
    pub committed_offset: Option<i64>,
    pub metrics: PartitionMetrics,
}
