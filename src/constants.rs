//! # System Constants
//!
//! Defaults and environment variable names that define the operational
//! boundaries of the batch window engine.

use std::time::Duration;

/// Default maximum number of buffered messages per batch
pub const DEFAULT_SIZE_LIMIT: usize = 50;

/// Default maximum buffering duration per batch
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(5);

/// Default bound of each partition's inbound queue
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default number of flush reports buffered for slow subscribers
pub const DEFAULT_REPORT_CAPACITY: usize = 256;

/// Commits retained by the in-memory checkpointer's history
pub const DEFAULT_CHECKPOINT_HISTORY: usize = 1024;

/// Environment variables recognised by the engine and its host binary
pub mod env {
    /// Prefix for configuration overrides, e.g. `BATCH_WINDOW__SIZE_LIMIT=100`
    pub const CONFIG_PREFIX: &str = "BATCH_WINDOW";
    pub const CONFIG_SEPARATOR: &str = "__";

    /// Path to the configuration file
    pub const CONFIG_FILE: &str = "BATCH_WINDOW_CONFIG";

    pub const ENVIRONMENT: &str = "BATCH_WINDOW_ENV";
    pub const APP_ENVIRONMENT: &str = "APP_ENV";

    /// Directory for the JSON log file; file logging is disabled when unset
    pub const LOG_DIR: &str = "BATCH_WINDOW_LOG_DIR";
}

/// Lifecycle operation names used in structured logs
pub mod lifecycle {
    pub const PARTITION_CLAIMED: &str = "partition.claimed";
    pub const PARTITION_REVOKED: &str = "partition.revoked";
    pub const PARTITION_DRAINING: &str = "partition.draining";
    pub const PARTITION_TERMINATED: &str = "partition.terminated";
    pub const ENGINE_SHUTDOWN: &str = "engine.shutdown";
}
