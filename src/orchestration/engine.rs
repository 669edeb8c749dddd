//! # Window Engine
//!
//! Supervises the set of active partition workers. The engine is pure
//! orchestration: it routes claim, revoke, ingest and shutdown to the right
//! worker and aggregates completion, while each worker exclusively owns its
//! window, checkpoint value and timer.
//!
//! The registry of workers is the only structure touched by more than one
//! task. It is a sharded `DashMap`, so the critical section is limited to a
//! single insert, lookup or remove and never spans partitions.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use batch_window::config::WindowConfig;
//! use batch_window::messaging::{InboundMessage, JsonDecoder, PartitionId};
//! use batch_window::orchestration::{BatchProcessor, DecodedBatch, InMemoryCheckpointer, WindowEngine};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct PrintProcessor;
//!
//! #[async_trait::async_trait]
//! impl BatchProcessor<serde_json::Value> for PrintProcessor {
//!     async fn process(&self, batch: &DecodedBatch<serde_json::Value>) -> anyhow::Result<()> {
//!         println!("{} events from partition {}", batch.len(), batch.partition);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = WindowEngine::new(
//!     WindowConfig::new(50, Duration::from_secs(5))?,
//!     JsonDecoder::<serde_json::Value>::new(),
//!     Arc::new(PrintProcessor),
//!     Arc::new(InMemoryCheckpointer::new()),
//! )?;
//!
//! engine.claim_partition(PartitionId(0))?;
//! engine.ingest(InboundMessage::new(PartitionId(0), 1, br#"{"id":1}"#.to_vec())).await?;
//! engine.revoke_partition(PartitionId(0)).await?;
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::config::WindowConfig;
use crate::constants::lifecycle;
use crate::error::{EngineError, Result};
use crate::logging;
use crate::messaging::{InboundMessage, PartitionId};
use crate::orchestration::flush::{FlushExecutor, FlushReport};
use crate::orchestration::metrics::PartitionSummary;
use crate::orchestration::partition_worker::{PartitionWorker, WorkerHandle};
use crate::orchestration::traits::{BatchProcessor, Checkpointer, Decoder};
use crate::state_machine::PartitionState;

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub engine_id: Uuid,
    pub active_partitions: usize,
    pub shutting_down: bool,
}

pub struct WindowEngine<D: Decoder> {
    /// Unique identifier for this engine instance
    id: Uuid,
    config: WindowConfig,
    executor: FlushExecutor<D>,
    /// partition → running worker
    workers: DashMap<PartitionId, WorkerHandle>,
    reports: broadcast::Sender<FlushReport>,
    shutting_down: AtomicBool,
}

impl<D: Decoder> std::fmt::Debug for WindowEngine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowEngine")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("active_partitions", &self.workers.len())
            .field("shutting_down", &self.shutting_down.load(Ordering::Acquire))
            .finish()
    }
}

impl<D: Decoder> WindowEngine<D> {
    /// Create an engine with no claimed partitions
    pub fn new(
        config: WindowConfig,
        decoder: D,
        processor: Arc<dyn BatchProcessor<D::Event>>,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Result<Self> {
        config.validate()?;

        let id = Uuid::new_v4();
        let (reports, _) = broadcast::channel(config.report_capacity);

        info!(
            engine_id = %id,
            size_limit = config.size_limit,
            time_limit_ms = config.time_limit_ms,
            "🏗️ ENGINE: Window engine created"
        );

        Ok(Self {
            id,
            executor: FlushExecutor::new(Arc::new(decoder), processor, checkpointer),
            config,
            workers: DashMap::new(),
            reports,
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Start a worker for the partition in `Idle`.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self), fields(engine_id = %self.id))]
    pub fn claim_partition(&self, partition: PartitionId) -> Result<()> {
        if self.is_shutting_down() {
            return Err(EngineError::ShuttingDown);
        }

        // A worker that is still draining keeps the partition claimed
        let cancel = match self.workers.entry(partition) {
            Entry::Occupied(slot) if !slot.get().is_terminated() => {
                return Err(EngineError::PartitionAlreadyClaimed { partition });
            }
            Entry::Occupied(mut slot) => {
                let handle = self.spawn_worker(partition);
                let cancel = handle.cancel.clone();
                slot.insert(handle);
                cancel
            }
            Entry::Vacant(slot) => {
                let handle = self.spawn_worker(partition);
                let cancel = handle.cancel.clone();
                slot.insert(handle);
                cancel
            }
        };

        // Shutdown may have started between the check and the insert
        if self.is_shutting_down() {
            if let Some((_, mut handle)) = self
                .workers
                .remove_if(&partition, |_, worker| worker.is_instance(&cancel))
            {
                handle.begin_drain();
            }
            return Err(EngineError::ShuttingDown);
        }

        logging::log_partition_lifecycle(lifecycle::PARTITION_CLAIMED, partition, None);
        Ok(())
    }

    fn spawn_worker(&self, partition: PartitionId) -> WorkerHandle {
        PartitionWorker::spawn(
            partition,
            &self.config,
            self.executor.clone(),
            self.reports.clone(),
        )
    }

    /// Hand a delivered message to its partition's worker.
    ///
    /// Waits when the partition's inbound queue is full. Fails with
    /// `UnknownPartition` if no worker is registered or it is draining
    /// (e.g. after revoke).
    pub async fn ingest(&self, message: InboundMessage) -> Result<()> {
        let partition = message.partition();
        let sender = self
            .workers
            .get(&partition)
            .filter(|worker| !worker.is_draining())
            .map(|worker| worker.sender.clone())
            .ok_or_else(|| EngineError::unknown_partition(partition))?;

        // The worker closes its queue once it starts draining
        sender
            .send(message)
            .await
            .map_err(|_| EngineError::unknown_partition(partition))
    }

    /// Drain the partition's worker, then remove it.
    ///
    /// The partition stays registered (and cannot be claimed again) until the
    /// forced flush has completed. Returns `None` when the partition is not
    /// claimed or is already being drained; revoking twice is a no-op.
    #[instrument(skip(self), fields(engine_id = %self.id))]
    pub async fn revoke_partition(&self, partition: PartitionId) -> Result<Option<PartitionSummary>> {
        let drain = self.workers.get_mut(&partition).and_then(|mut worker| {
            let join = worker.begin_drain()?;
            Some((join, worker.cancel.clone()))
        });
        let Some((join, cancel)) = drain else {
            debug!(partition = %partition, "ENGINE: Revoke for unclaimed or draining partition ignored");
            return Ok(None);
        };

        logging::log_partition_lifecycle(lifecycle::PARTITION_REVOKED, partition, None);

        let result = join.await;
        self.workers
            .remove_if(&partition, |_, worker| worker.is_instance(&cancel));

        result
            .map(Some)
            .map_err(|e| EngineError::worker_failed(partition, e.to_string()))
    }

    /// Drain every active worker concurrently and wait for all to terminate.
    ///
    /// Second and later calls return immediately with no summaries.
    #[instrument(skip(self), fields(engine_id = %self.id))]
    pub async fn shutdown(&self) -> Vec<PartitionSummary> {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            debug!("ENGINE: Shutdown already requested");
            return Vec::new();
        }

        // Collect keys first; mutating while iterating would deadlock a shard
        let partitions: Vec<PartitionId> = self.workers.iter().map(|entry| *entry.key()).collect();
        let mut joins = Vec::with_capacity(partitions.len());
        let mut revoking = Vec::new();
        for partition in partitions {
            let Some(mut worker) = self.workers.get_mut(&partition) else {
                continue;
            };
            match worker.begin_drain() {
                Some(join) => joins.push((partition, join)),
                // A concurrent revoke owns the join handle; wait for termination instead
                None => revoking.push(worker.state.clone()),
            }
        }

        info!(
            partitions = joins.len(),
            revoking = revoking.len(),
            "🛑 ENGINE: Shutting down, draining all partitions"
        );

        let results = join_all(
            joins
                .into_iter()
                .map(|(partition, join)| async move { (partition, join.await) }),
        )
        .await;
        join_all(revoking.into_iter().map(|mut state| async move {
            // Err only if the worker is gone, which also means it terminated
            let _ = state.wait_for(PartitionState::is_terminal).await;
        }))
        .await;
        self.workers.retain(|_, worker| !worker.is_draining());

        let mut summaries = Vec::with_capacity(results.len());
        for (partition, result) in results {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!(
                    partition = %partition,
                    error = %e,
                    "❌ ENGINE: Worker failed during shutdown"
                ),
            }
        }
        summaries.sort_by_key(|summary| summary.partition);

        info!(
            operation = lifecycle::ENGINE_SHUTDOWN,
            partitions_drained = summaries.len(),
            "✅ ENGINE: Shutdown complete"
        );

        summaries
    }

    /// Receive a report for every flush executed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<FlushReport> {
        self.reports.subscribe()
    }

    /// Current state, including `Draining` while a revoke is in progress
    pub fn partition_state(&self, partition: PartitionId) -> Option<PartitionState> {
        self.workers
            .get(&partition)
            .map(|worker| *worker.state.borrow())
    }

    /// Follow a partition's state transitions until it terminates
    pub fn watch_partition(&self, partition: PartitionId) -> Option<watch::Receiver<PartitionState>> {
        self.workers
            .get(&partition)
            .map(|worker| worker.state.clone())
    }

    /// Claimed partitions that are not draining, sorted
    pub fn active_partitions(&self) -> Vec<PartitionId> {
        let mut partitions: Vec<PartitionId> = self
            .workers
            .iter()
            .filter(|entry| !entry.value().is_draining())
            .map(|entry| *entry.key())
            .collect();
        partitions.sort();
        partitions
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            engine_id: self.id,
            active_partitions: self
                .workers
                .iter()
                .filter(|entry| !entry.value().is_draining())
                .count(),
            shutting_down: self.is_shutting_down(),
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}
