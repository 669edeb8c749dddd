//! # Flush Execution
//!
//! Runs decode → process → checkpoint over one drained batch.
//!
//! ## Checkpoint discipline
//!
//! - Decode failures are skipped and counted; they never abort the flush.
//! - The processor is called once with every successfully decoded record, and
//!   not at all when nothing decoded.
//! - The checkpoint is the highest offset among *all* buffered messages,
//!   decoded or skipped, and is only written after the processor succeeds
//!   (or when every message failed to decode).
//! - A processor failure withholds the checkpoint; the batch is abandoned to
//!   upstream redelivery.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::messaging::{InboundMessage, PartitionId};
use crate::orchestration::traits::{BatchProcessor, Checkpointer, Decoder};

/// Why a flush was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushTrigger {
    Size,
    Time,
    /// Forced by revoke, shutdown, or the source closing
    Drain,
}

impl std::fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Size => write!(f, "size"),
            Self::Time => write!(f, "time"),
            Self::Drain => write!(f, "drain"),
        }
    }
}

/// A message paired with the event it decoded to
#[derive(Debug, Clone)]
pub struct DecodedRecord<E> {
    pub message: InboundMessage,
    pub event: E,
}

/// The decoded view of one flush, handed to the batch processor
#[derive(Debug, Clone)]
pub struct DecodedBatch<E> {
    pub partition: PartitionId,
    pub trigger: FlushTrigger,
    /// Successfully decoded records, in arrival order
    pub records: Vec<DecodedRecord<E>>,
    /// Messages skipped because they failed to decode
    pub skipped: usize,
    /// Highest offset among all messages in the flush, decoded or not
    pub last_offset: i64,
}

impl<E> DecodedBatch<E> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &E> {
        self.records.iter().map(|record| &record.event)
    }
}

/// Result of the process/checkpoint steps of one flush
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Checkpoint advanced to `offset`
    Committed { offset: i64 },
    /// Processor failed; checkpoint withheld
    ProcessFailed { error: EngineError },
    /// Processor succeeded (or was skipped) but the checkpoint write failed.
    /// The batch may be reprocessed after redelivery.
    CheckpointFailed { offset: i64, error: EngineError },
}

impl FlushOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    pub fn committed_offset(&self) -> Option<i64> {
        match self {
            Self::Committed { offset } => Some(*offset),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            Self::Committed { .. } => None,
            Self::ProcessFailed { error } | Self::CheckpointFailed { error, .. } => Some(error),
        }
    }
}

/// Summary of one executed flush, broadcast to engine subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    pub partition: PartitionId,
    pub trigger: FlushTrigger,
    pub message_count: usize,
    pub decoded_count: usize,
    pub skipped_count: usize,
    pub first_offset: i64,
    pub last_offset: i64,
    pub outcome: FlushOutcome,
    pub duration: Duration,
}

impl FlushReport {
    /// Messages handled per second, for throughput logging
    pub fn throughput(&self) -> f64 {
        let seconds = self.duration.as_secs_f64();
        if seconds > 0.0 {
            self.message_count as f64 / seconds
        } else {
            0.0
        }
    }

    /// The committed offset, or the failure that prevented it
    pub fn into_result(self) -> Result<i64, EngineError> {
        match self.outcome {
            FlushOutcome::Committed { offset } => Ok(offset),
            FlushOutcome::ProcessFailed { error } | FlushOutcome::CheckpointFailed { error, .. } => {
                Err(error)
            }
        }
    }
}

/// Shared decode/process/checkpoint pipeline, cloned into every flush task
pub struct FlushExecutor<D: Decoder> {
    decoder: Arc<D>,
    processor: Arc<dyn BatchProcessor<D::Event>>,
    checkpointer: Arc<dyn Checkpointer>,
}

impl<D: Decoder> Clone for FlushExecutor<D> {
    fn clone(&self) -> Self {
        Self {
            decoder: self.decoder.clone(),
            processor: self.processor.clone(),
            checkpointer: self.checkpointer.clone(),
        }
    }
}

impl<D: Decoder> std::fmt::Debug for FlushExecutor<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushExecutor")
            .field("decoder", &std::any::type_name::<D>())
            .finish()
    }
}

impl<D: Decoder> FlushExecutor<D> {
    pub fn new(
        decoder: Arc<D>,
        processor: Arc<dyn BatchProcessor<D::Event>>,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Self {
        Self {
            decoder,
            processor,
            checkpointer,
        }
    }

    /// Decode every message, keeping arrival order and counting failures
    pub fn decode(
        &self,
        partition: PartitionId,
        trigger: FlushTrigger,
        messages: Vec<InboundMessage>,
    ) -> DecodedBatch<D::Event> {
        let last_offset = messages
            .iter()
            .map(InboundMessage::offset)
            .max()
            .unwrap_or_default();
        let mut records = Vec::with_capacity(messages.len());
        let mut skipped = 0;

        for message in messages {
            match self.decoder.decode(&message) {
                Ok(event) => records.push(DecodedRecord { message, event }),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        partition = %partition,
                        offset = message.offset(),
                        error = %e,
                        "⚠️ FLUSH: Skipping undecodable message"
                    );
                }
            }
        }

        DecodedBatch {
            partition,
            trigger,
            records,
            skipped,
            last_offset,
        }
    }

    /// Run the full flush over a non-empty drained batch
    pub async fn execute(
        &self,
        partition: PartitionId,
        trigger: FlushTrigger,
        messages: Vec<InboundMessage>,
    ) -> FlushReport {
        let started = Instant::now();
        let message_count = messages.len();
        let first_offset = messages
            .iter()
            .map(InboundMessage::offset)
            .min()
            .unwrap_or_default();

        debug!(
            partition = %partition,
            trigger = %trigger,
            message_count,
            "📦 FLUSH: Starting batch"
        );

        let batch = self.decode(partition, trigger, messages);
        let decoded_count = batch.len();
        let skipped_count = batch.skipped;
        let last_offset = batch.last_offset;

        let outcome = if batch.is_empty() {
            // Permanently undecodable messages must not block progress
            debug!(
                partition = %partition,
                skipped_count,
                "FLUSH: Nothing decoded, advancing checkpoint without processing"
            );
            self.commit(partition, last_offset).await
        } else {
            match self.processor.process(&batch).await {
                Ok(()) => self.commit(partition, last_offset).await,
                Err(e) => FlushOutcome::ProcessFailed {
                    error: EngineError::process(partition, &e),
                },
            }
        };

        FlushReport {
            partition,
            trigger,
            message_count,
            decoded_count,
            skipped_count,
            first_offset,
            last_offset,
            outcome,
            duration: started.elapsed(),
        }
    }

    async fn commit(&self, partition: PartitionId, offset: i64) -> FlushOutcome {
        match self.checkpointer.commit(partition, offset).await {
            Ok(()) => FlushOutcome::Committed { offset },
            Err(e) => FlushOutcome::CheckpointFailed {
                offset,
                error: EngineError::checkpoint(partition, offset, &e),
            },
        }
    }
}
