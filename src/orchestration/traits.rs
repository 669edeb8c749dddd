//! # Collaborator Traits
//!
//! The engine never inspects business logic. It talks to three externally
//! supplied collaborators through these seams:
//!
//! ```text
//! buffered messages ──→ Decoder (per message) ──→ BatchProcessor (once per flush)
//!                                                        │ success
//!                                                        ▼
//!                                                  Checkpointer (highest offset)
//! ```

use async_trait::async_trait;

use crate::error::DecodeError;
use crate::messaging::{InboundMessage, PartitionId};
use crate::orchestration::flush::DecodedBatch;

/// Pure conversion from a delivered message to a domain event.
///
/// Called once per buffered message during a flush. A `DecodeError` skips the
/// message; it still counts towards the checkpointed offset.
pub trait Decoder: Send + Sync + 'static {
    type Event: Send + Sync + 'static;

    fn decode(&self, message: &InboundMessage) -> Result<Self::Event, DecodeError>;
}

/// Business processing of one decoded batch.
///
/// Invoked at most once per flush, only when at least one message decoded.
/// Returning an error withholds the checkpoint for the batch.
#[async_trait]
pub trait BatchProcessor<E>: Send + Sync + 'static {
    async fn process(&self, batch: &DecodedBatch<E>) -> anyhow::Result<()>;
}

/// Durable sink for "delivered up to offset X" markers.
///
/// Invoked only after a successful `BatchProcessor` call (or a flush in which
/// every message failed to decode).
#[async_trait]
pub trait Checkpointer: Send + Sync + 'static {
    async fn commit(&self, partition: PartitionId, offset: i64) -> anyhow::Result<()>;
}
