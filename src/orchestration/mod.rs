//! # Orchestration
//!
//! The windowed batch-aggregation core.
//!
//! ## Core Components
//!
//! - **WindowEngine**: registry of partition workers; routes claim, revoke,
//!   ingest and shutdown
//! - **PartitionWorker**: per-partition task running the trigger/flush protocol
//! - **BatchWindow**: dual-trigger (size or time) accumulation buffer
//! - **FlushExecutor**: decode, process, checkpoint for one drained batch
//! - **Decoder / BatchProcessor / Checkpointer**: externally supplied collaborators
//!
//! ## Flow
//!
//! ```text
//! ingest ──→ PartitionWorker ──→ BatchWindow ──(size | time | drain)──→ FlushExecutor
//!                                                                          │
//!                                             FlushReport ←── checkpoint ←─┘
//! ```

pub mod batch_window;
pub mod checkpoint;
pub mod engine;
pub mod flush;
pub mod metrics;
pub mod partition_worker;
pub mod traits;

pub use batch_window::{BatchWindow, TriggerDecision};
pub use checkpoint::InMemoryCheckpointer;
pub use engine::{EngineStatus, WindowEngine};
pub use flush::{
    DecodedBatch, DecodedRecord, FlushExecutor, FlushOutcome, FlushReport, FlushTrigger,
};
pub use metrics::{PartitionMetrics, PartitionSummary};
pub use traits::{BatchProcessor, Checkpointer, Decoder};
