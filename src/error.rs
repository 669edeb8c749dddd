//! # Engine Error Types
//!
//! Structured error handling for the batch window engine using thiserror.
//! Every failure is scoped to one partition's one batch; nothing here is
//! fatal to the host process.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::messaging::PartitionId;

/// Errors surfaced by the engine to its host
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Batch processing failed for partition {partition}: {message}")]
    Process {
        partition: PartitionId,
        message: String,
    },

    #[error("Checkpoint to offset {offset} failed for partition {partition}: {message}")]
    Checkpoint {
        partition: PartitionId,
        offset: i64,
        message: String,
    },

    #[error("No worker registered for partition {partition}")]
    UnknownPartition { partition: PartitionId },

    #[error("Partition {partition} is already claimed")]
    PartitionAlreadyClaimed { partition: PartitionId },

    #[error("Engine is shutting down")]
    ShuttingDown,

    #[error("Worker for partition {partition} failed: {message}")]
    WorkerFailed {
        partition: PartitionId,
        message: String,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl EngineError {
    /// Wrap a business processor failure, keeping the full error chain
    pub fn process(partition: PartitionId, source: &anyhow::Error) -> Self {
        Self::Process {
            partition,
            message: format!("{source:#}"),
        }
    }

    /// Wrap a checkpointer failure for the given offset
    pub fn checkpoint(partition: PartitionId, offset: i64, source: &anyhow::Error) -> Self {
        Self::Checkpoint {
            partition,
            offset,
            message: format!("{source:#}"),
        }
    }

    pub fn unknown_partition(partition: PartitionId) -> Self {
        Self::UnknownPartition { partition }
    }

    pub fn worker_failed(partition: PartitionId, message: impl Into<String>) -> Self {
        Self::WorkerFailed {
            partition,
            message: message.into(),
        }
    }

    /// Whether the host caused this error (as opposed to a collaborator failing)
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownPartition { .. } | Self::PartitionAlreadyClaimed { .. } | Self::ShuttingDown
        )
    }
}

/// A single message could not be decoded.
///
/// Never fatal: the message is skipped and counted, and the flush continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Decode error: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
