//! # Batch Consumer
//!
//! Runs the window engine against a synthetic order stream. Each claimed
//! partition receives a run of JSON order events (with the occasional
//! malformed payload) and an aggregating processor totals every batch.
//! Stops after the message budget or on Ctrl-C, then drains all partitions.

use anyhow::Context;
use async_trait::async_trait;
use batch_window::constants::{env, DEFAULT_SIZE_LIMIT, DEFAULT_TIME_LIMIT};
use batch_window::logging::init_structured_logging;
use batch_window::{
    BatchProcessor, ConfigLoader, DecodedBatch, InMemoryCheckpointer, InboundMessage, JsonDecoder,
    MessageHeader, PartitionId, WindowConfig, WindowEngine,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use futures::future::try_join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "batch_consumer")]
#[command(about = "Aggregate a synthetic order stream in size- or time-bounded batches")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); defaults to $BATCH_WINDOW_CONFIG
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of partitions to claim
    #[arg(short, long, default_value_t = 3)]
    partitions: i32,

    /// Messages produced per partition
    #[arg(short, long, default_value_t = 250)]
    messages: i64,

    /// Every Nth payload is malformed (0 disables)
    #[arg(long, default_value_t = 40)]
    malformed_every: i64,

    /// Delay between messages on a partition
    #[arg(long, default_value_t = 2)]
    interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderEvent {
    order_id: i64,
    user_id: String,
    amount_cents: i64,
    placed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct OrderTotals {
    batches: u64,
    orders: u64,
    amount_cents: i64,
    users: HashSet<String>,
}

#[derive(Debug, Default)]
struct OrderAggregator {
    totals: Mutex<HashMap<PartitionId, OrderTotals>>,
}

#[async_trait]
impl BatchProcessor<OrderEvent> for OrderAggregator {
    async fn process(&self, batch: &DecodedBatch<OrderEvent>) -> anyhow::Result<()> {
        let batch_amount: i64 = batch.events().map(|order| order.amount_cents).sum();

        let mut totals = self.totals.lock();
        let partition = totals.entry(batch.partition).or_default();
        partition.batches += 1;
        partition.orders += batch.len() as u64;
        partition.amount_cents += batch_amount;
        partition
            .users
            .extend(batch.events().map(|order| order.user_id.clone()));

        info!(
            partition = %batch.partition,
            trigger = %batch.trigger,
            orders = batch.len(),
            skipped = batch.skipped,
            batch_amount_cents = batch_amount,
            "🧮 AGGREGATOR: Batch totalled"
        );
        Ok(())
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<WindowConfig> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::new().with_file(path),
        None if std::env::var(env::CONFIG_FILE).is_ok() => ConfigLoader::from_env(),
        None => return Ok(WindowConfig::new(DEFAULT_SIZE_LIMIT, DEFAULT_TIME_LIMIT)?),
    };
    Ok(loader.load()?)
}

fn order_payload(partition: PartitionId, offset: i64, malformed_every: i64) -> anyhow::Result<Vec<u8>> {
    if malformed_every > 0 && offset % malformed_every == 0 {
        return Ok(b"{\"order_id\": ".to_vec());
    }

    let order = OrderEvent {
        order_id: i64::from(partition.0) * 1_000_000 + offset,
        user_id: format!("user-{}", offset % 17),
        amount_cents: 500 + (offset * 37) % 9_500,
        placed_at: Utc::now(),
    };
    Ok(serde_json::to_vec(&order)?)
}

async fn produce(
    engine: &WindowEngine<JsonDecoder<OrderEvent>>,
    partition: PartitionId,
    cli: &Cli,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_millis(cli.interval_ms.max(1)));

    for offset in 1..=cli.messages {
        ticker.tick().await;
        let message = InboundMessage::new(
            partition,
            offset,
            order_payload(partition, offset, cli.malformed_every)?,
        )
        .with_key(format!("user-{}", offset % 17))
        .with_header(MessageHeader::new("producer", "batch_consumer"))
        .with_arrival_sequence(offset as u64);

        engine
            .ingest(message)
            .await
            .with_context(|| format!("ingest failed for partition {partition} at offset {offset}"))?;
    }

    info!(partition = %partition, messages = cli.messages, "📤 PRODUCER: Partition stream complete");
    Ok(())
}

fn claim_all(
    engine: &WindowEngine<JsonDecoder<OrderEvent>>,
    partitions: &[PartitionId],
) -> anyhow::Result<()> {
    for partition in partitions {
        engine.claim_partition(*partition)?;
    }
    Ok(())
}

/// Feed every partition until the message budget is spent or Ctrl-C arrives
async fn run_producers(
    engine: &WindowEngine<JsonDecoder<OrderEvent>>,
    partitions: &[PartitionId],
    cli: &Cli,
) -> anyhow::Result<()> {
    let producers = try_join_all(
        partitions
            .iter()
            .map(|partition| produce(engine, *partition, cli)),
    );

    tokio::select! {
        result = producers => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => info!("🛑 BATCH_CONSUMER: Interrupted, draining"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let config = load_config(&cli).context("failed to load window configuration")?;
    info!(
        size_limit = config.size_limit,
        time_limit_ms = config.time_limit_ms,
        partitions = cli.partitions,
        "🚀 BATCH_CONSUMER: Starting"
    );

    let aggregator = Arc::new(OrderAggregator::default());
    let checkpointer = Arc::new(InMemoryCheckpointer::new());
    let engine = WindowEngine::new(
        config,
        JsonDecoder::<OrderEvent>::new(),
        aggregator.clone(),
        checkpointer.clone(),
    )?;

    let mut reports = engine.subscribe();
    let report_watcher = tokio::spawn(async move {
        let mut failed = 0_u64;
        loop {
            match reports.recv().await {
                Ok(report) if !report.outcome.is_committed() => {
                    failed += 1;
                    warn!(
                        partition = %report.partition,
                        last_offset = report.last_offset,
                        error = ?report.outcome.error(),
                        "BATCH_CONSUMER: Flush did not commit"
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "BATCH_CONSUMER: Report subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        failed
    });

    let partitions: Vec<PartitionId> = (0..cli.partitions).map(PartitionId).collect();
    let outcome = match claim_all(&engine, &partitions) {
        Ok(()) => run_producers(&engine, &partitions, &cli).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &outcome {
        error!(error = ?e, "❌ BATCH_CONSUMER: Stopped early, draining accepted messages");
    }

    // Always drain, so batches accepted before a failure are still processed
    let summaries = engine.shutdown().await;
    drop(engine);
    let failed_flushes = report_watcher.await.unwrap_or_default();

    let totals = aggregator.totals.lock();
    for summary in &summaries {
        let partition_totals = totals.get(&summary.partition);
        info!(
            partition = %summary.partition,
            committed_offset = ?summary.committed_offset,
            checkpointed = ?checkpointer.committed(summary.partition),
            flushes = summary.metrics.total_flushes(),
            skipped = summary.metrics.messages_skipped,
            batches = partition_totals.map_or(0, |t| t.batches),
            orders = partition_totals.map_or(0, |t| t.orders),
            amount_cents = partition_totals.map_or(0, |t| t.amount_cents),
            distinct_users = partition_totals.map_or(0, |t| t.users.len()),
            "📊 BATCH_CONSUMER: Partition totals"
        );
    }
    info!(failed_flushes, "✅ BATCH_CONSUMER: Finished");

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_engine(aggregator: Arc<OrderAggregator>) -> WindowEngine<JsonDecoder<OrderEvent>> {
        WindowEngine::new(
            WindowConfig::new(100, Duration::from_secs(3600)).unwrap(),
            JsonDecoder::new(),
            aggregator,
            Arc::new(InMemoryCheckpointer::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_producer_failure_still_drains_accepted_messages() {
        let cli = Cli::parse_from(["batch_consumer", "--messages", "5", "--malformed-every", "0"]);
        let aggregator = Arc::new(OrderAggregator::default());
        let engine = test_engine(aggregator.clone());

        // Partition 1 is never claimed, so its producer fails on the first ingest
        engine.claim_partition(PartitionId(0)).unwrap();
        let outcome = run_producers(&engine, &[PartitionId(0), PartitionId(1)], &cli).await;
        assert!(outcome.is_err());

        let summaries = engine.shutdown().await;
        assert_eq!(summaries.len(), 1);

        let ingested = summaries[0].metrics.messages_ingested;
        assert!(ingested >= 1);
        assert_eq!(summaries[0].committed_offset, Some(ingested as i64));
        assert_eq!(
            aggregator.totals.lock().get(&PartitionId(0)).map(|t| t.orders),
            Some(ingested)
        );
    }

    #[test]
    fn test_malformed_payloads_are_injected() {
        let malformed = order_payload(PartitionId(0), 40, 40).unwrap();
        let valid = order_payload(PartitionId(0), 41, 40).unwrap();

        assert!(serde_json::from_slice::<OrderEvent>(&malformed).is_err());
        assert!(serde_json::from_slice::<OrderEvent>(&valid).is_ok());
    }
}
