//! # Structured Logging Module
//!
//! Environment-aware structured logging to the console and, optionally, a
//! JSON log file, plus helpers that give every flush and lifecycle event the
//! same field layout.

use chrono::Utc;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::env;
use crate::messaging::PartitionId;
use crate::orchestration::flush::{FlushOutcome, FlushReport};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let pid = process::id();

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(build_filter(&log_level));

        // JSON file output only when a log directory is configured
        let log_dir = std::env::var(env::LOG_DIR).ok().map(PathBuf::from);
        let file_layer = log_dir.as_ref().map(|dir| {
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
            let file_name = format!("{environment}.{pid}.{timestamp}.log");
            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

            // The writer must outlive every span; logging lasts for the process
            std::mem::forget(guard);

            fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(build_filter(&log_level))
        });

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        if subscriber.try_init().is_err() {
            // A global subscriber is already set (likely by the host application)
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_dir = ?log_dir,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var(env::ENVIRONMENT)
        .or_else(|_| std::env::var(env::APP_ENVIRONMENT))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log the outcome of one flush.
///
/// Committed flushes log at INFO, checkpoint failures at WARN (the batch was
/// processed), processing failures at ERROR.
pub fn log_flush_operation(report: &FlushReport) {
    match &report.outcome {
        FlushOutcome::Committed { offset } => {
            tracing::info!(
                partition = %report.partition,
                trigger = %report.trigger,
                message_count = report.message_count,
                decoded_count = report.decoded_count,
                skipped_count = report.skipped_count,
                first_offset = report.first_offset,
                last_offset = report.last_offset,
                checkpoint = offset,
                duration_ms = report.duration.as_millis() as u64,
                messages_per_second = report.throughput(),
                "✅ FLUSH_OPERATION: Batch committed"
            );
        }
        FlushOutcome::CheckpointFailed { offset, error } => {
            tracing::warn!(
                partition = %report.partition,
                trigger = %report.trigger,
                message_count = report.message_count,
                last_offset = report.last_offset,
                checkpoint = offset,
                error = %error,
                duration_ms = report.duration.as_millis() as u64,
                "⚠️ FLUSH_OPERATION: Batch processed but checkpoint failed"
            );
        }
        FlushOutcome::ProcessFailed { error } => {
            tracing::error!(
                partition = %report.partition,
                trigger = %report.trigger,
                message_count = report.message_count,
                first_offset = report.first_offset,
                last_offset = report.last_offset,
                error = %error,
                duration_ms = report.duration.as_millis() as u64,
                "❌ FLUSH_OPERATION: Batch processing failed, checkpoint withheld"
            );
        }
    }
}

/// Log a partition lifecycle event (claim, revoke, drain, terminate)
pub fn log_partition_lifecycle(operation: &str, partition: PartitionId, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        partition = %partition,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔄 PARTITION_LIFECYCLE"
    );
}
