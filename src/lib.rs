#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Batch Window
//!
//! Windowed batch aggregation for partitioned-stream consumers.
//!
//! ## Overview
//!
//! Messages arrive from an ordered, partitioned stream. For every partition the
//! consumer is assigned, a dedicated worker accumulates messages into a window
//! that flushes when it reaches a configured size **or** when a configured time
//! has elapsed since the window opened, whichever comes first. A flush decodes
//! each message, hands the decoded batch to a business processor, and on success
//! checkpoints the highest offset in the batch.
//!
//! ## Guarantees
//!
//! - A batch never exceeds `size_limit` messages
//! - Messages of a partition reach the processor in arrival order, each in exactly one batch
//! - Checkpoints for a partition are monotonic and withheld when processing fails
//! - Revoke and shutdown flush everything already accepted before terminating
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Engine, partition workers, windows and flush execution
//! - [`messaging`] - Inbound message records and stock decoders
//! - [`state_machine`] - Partition worker states
//! - [`config`] - Configuration with file and environment sources
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and flush/lifecycle helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_window::{InMemoryCheckpointer, JsonDecoder, PartitionId, WindowConfig, WindowEngine};
//! # use batch_window::{BatchProcessor, DecodedBatch};
//! # struct Noop;
//! # #[async_trait::async_trait]
//! # impl BatchProcessor<serde_json::Value> for Noop {
//! #     async fn process(&self, _: &DecodedBatch<serde_json::Value>) -> anyhow::Result<()> { Ok(()) }
//! # }
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = WindowEngine::new(
//!     WindowConfig::new(100, Duration::from_secs(2))?,
//!     JsonDecoder::<serde_json::Value>::new(),
//!     Arc::new(Noop),
//!     Arc::new(InMemoryCheckpointer::new()),
//! )?;
//!
//! engine.claim_partition(PartitionId(3))?;
//! // ... engine.ingest(message).await? for every delivered message ...
//! let summaries = engine.shutdown().await;
//! println!("{summaries:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests, including paused-clock engine scenarios
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod orchestration;
pub mod state_machine;

pub use config::{ConfigLoader, ConfigurationError, WindowConfig};
pub use error::{DecodeError, EngineError, Result};
pub use messaging::{InboundMessage, JsonDecoder, MessageHeader, PartitionId};
pub use orchestration::{
    BatchProcessor, Checkpointer, DecodedBatch, Decoder, EngineStatus, FlushOutcome, FlushReport,
    FlushTrigger, InMemoryCheckpointer, PartitionMetrics, PartitionSummary, WindowEngine,
};
pub use state_machine::PartitionState;
