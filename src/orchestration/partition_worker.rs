//! # Partition Worker
//!
//! Owns one partition's [`BatchWindow`], inbound queue, checkpoint value and
//! metrics, and runs the trigger/flush protocol as a single Tokio task.
//!
//! ## Event loop
//!
//! Each iteration races four named event sources, in priority order:
//!
//! 1. **Cancellation** (revoke or shutdown)
//! 2. **Flush completion** of the in-flight batch
//! 3. **Inbound message**
//! 4. **Window deadline** (time trigger)
//!
//! Flushes run on their own task so a slow processor never stalls the inbound
//! stream: a fresh window keeps filling while the previous batch is decoded,
//! processed and checkpointed. At most one flush is in flight; the next
//! trigger waits for it, which keeps checkpoints strictly ordered.

use std::future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::config::WindowConfig;
use crate::constants::lifecycle;
use crate::error::EngineError;
use crate::logging;
use crate::messaging::{InboundMessage, PartitionId};
use crate::orchestration::batch_window::BatchWindow;
use crate::orchestration::flush::{FlushExecutor, FlushOutcome, FlushReport, FlushTrigger};
use crate::orchestration::metrics::{PartitionMetrics, PartitionSummary};
use crate::orchestration::traits::Decoder;
use crate::state_machine::PartitionState;

/// Engine-side handle to a running worker.
///
/// Stays registered until the worker has terminated, so a draining partition
/// can be neither fed nor claimed again.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    pub sender: mpsc::Sender<InboundMessage>,
    pub cancel: Arc<Notify>,
    pub state: watch::Receiver<PartitionState>,
    /// Taken by whichever caller starts the drain
    join: Option<JoinHandle<PartitionSummary>>,
    draining: bool,
}

impl WorkerHandle {
    /// Signal cancellation and hand out the join handle, once
    pub fn begin_drain(&mut self) -> Option<JoinHandle<PartitionSummary>> {
        if self.draining {
            return None;
        }
        self.draining = true;
        self.cancel.notify_one();
        self.join.take()
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Drained to completion, but never unregistered (e.g. the revoking caller was dropped)
    pub fn is_terminated(&self) -> bool {
        self.draining && self.state.borrow().is_terminal()
    }

    /// Whether this handle belongs to the same worker instance as `cancel`
    pub fn is_instance(&self, cancel: &Arc<Notify>) -> bool {
        Arc::ptr_eq(&self.cancel, cancel)
    }
}

/// A flush running on its own task, with enough context to report a panic
struct InFlightFlush {
    handle: JoinHandle<FlushReport>,
    trigger: FlushTrigger,
    message_count: usize,
    first_offset: i64,
    last_offset: i64,
    started: Instant,
}

impl InFlightFlush {
    fn failed_report(&self, partition: PartitionId, err: JoinError) -> FlushReport {
        FlushReport {
            partition,
            trigger: self.trigger,
            message_count: self.message_count,
            decoded_count: 0,
            skipped_count: 0,
            first_offset: self.first_offset,
            last_offset: self.last_offset,
            outcome: FlushOutcome::ProcessFailed {
                error: EngineError::worker_failed(partition, format!("flush task failed: {err}")),
            },
            duration: self.started.elapsed(),
        }
    }
}

enum WorkerEvent {
    Cancelled,
    FlushCompleted(Result<FlushReport, JoinError>),
    Message(InboundMessage),
    SourceClosed,
    Deadline,
}

pub struct PartitionWorker<D: Decoder> {
    partition: PartitionId,
    window: BatchWindow,
    executor: FlushExecutor<D>,
    inbound: mpsc::Receiver<InboundMessage>,
    cancel: Arc<Notify>,
    state: watch::Sender<PartitionState>,
    in_flight: Option<InFlightFlush>,
    /// Last offset whose batch was processed and checkpointed
    committed: Option<i64>,
    metrics: PartitionMetrics,
    reports: broadcast::Sender<FlushReport>,
}

impl<D: Decoder> PartitionWorker<D> {
    /// Start a worker in `Idle` on the current runtime
    pub(crate) fn spawn(
        partition: PartitionId,
        config: &WindowConfig,
        executor: FlushExecutor<D>,
        reports: broadcast::Sender<FlushReport>,
    ) -> WorkerHandle {
        let (sender, inbound) = mpsc::channel(config.channel_capacity);
        let cancel = Arc::new(Notify::new());
        let (state, state_rx) = watch::channel(PartitionState::Idle);

        let worker = Self {
            partition,
            window: BatchWindow::from_config(partition, config),
            executor,
            inbound,
            cancel: cancel.clone(),
            state,
            in_flight: None,
            committed: None,
            metrics: PartitionMetrics::default(),
            reports,
        };

        let join = tokio::spawn(worker.run());

        WorkerHandle {
            sender,
            cancel,
            state: state_rx,
            join: Some(join),
            draining: false,
        }
    }

    async fn run(mut self) -> PartitionSummary {
        debug!(
            partition = %self.partition,
            size_limit = self.window.size_limit(),
            time_limit_ms = self.window.time_limit().as_millis() as u64,
            "WORKER: Partition worker started"
        );

        loop {
            match self.next_event().await {
                WorkerEvent::Cancelled => {
                    debug!(partition = %self.partition, "WORKER: Cancellation received");
                    break;
                }
                WorkerEvent::SourceClosed => {
                    debug!(partition = %self.partition, "WORKER: Inbound source closed");
                    break;
                }
                WorkerEvent::FlushCompleted(result) => {
                    if let Some(flight) = self.in_flight.take() {
                        self.finish_flush(flight, result);
                    }
                }
                WorkerEvent::Message(message) => self.admit(message).await,
                WorkerEvent::Deadline => {
                    if self.window.check_timeout(Instant::now()) {
                        self.start_flush(FlushTrigger::Time).await;
                    }
                }
            }
        }

        self.drain().await
    }

    async fn next_event(&mut self) -> WorkerEvent {
        let deadline = self.window.deadline();

        tokio::select! {
            biased;

            _ = self.cancel.notified() => WorkerEvent::Cancelled,
            result = join_in_flight(&mut self.in_flight) => WorkerEvent::FlushCompleted(result),
            message = self.inbound.recv() => match message {
                Some(message) => WorkerEvent::Message(message),
                None => WorkerEvent::SourceClosed,
            },
            _ = wait_until(deadline) => WorkerEvent::Deadline,
        }
    }

    async fn admit(&mut self, message: InboundMessage) {
        self.metrics.record_ingest();
        let now = Instant::now();

        if self.window.admit(message, now).requires_flush() {
            self.start_flush(FlushTrigger::Size).await;
            // Held-back messages may refill the window to its limit
            while self.window.is_full() {
                self.start_flush(FlushTrigger::Size).await;
            }
        } else if self.window.check_timeout(now) {
            // A steady stream must not starve the deadline branch
            self.start_flush(FlushTrigger::Time).await;
        }

        self.refresh_state();
    }

    /// Drain the window into a new flush task, after the previous one completes
    async fn start_flush(&mut self, trigger: FlushTrigger) {
        if self.window.is_empty() {
            return;
        }

        self.await_in_flight().await;

        let batch = self.window.drain_for_flush();
        let first_offset = batch.first().map(InboundMessage::offset).unwrap_or_default();
        let last_offset = batch.last().map(InboundMessage::offset).unwrap_or_default();
        let message_count = batch.len();

        debug!(
            partition = %self.partition,
            trigger = %trigger,
            message_count,
            first_offset,
            last_offset,
            "📦 WORKER: Flush triggered"
        );

        let executor = self.executor.clone();
        let partition = self.partition;
        let handle =
            tokio::spawn(async move { executor.execute(partition, trigger, batch).await });

        self.in_flight = Some(InFlightFlush {
            handle,
            trigger,
            message_count,
            first_offset,
            last_offset,
            started: Instant::now(),
        });
        self.refresh_state();
    }

    async fn await_in_flight(&mut self) {
        if let Some(mut flight) = self.in_flight.take() {
            let result = (&mut flight.handle).await;
            self.finish_flush(flight, result);
        }
    }

    fn finish_flush(&mut self, flight: InFlightFlush, result: Result<FlushReport, JoinError>) {
        let report = result.unwrap_or_else(|e| flight.failed_report(self.partition, e));

        if let Some(offset) = report.outcome.committed_offset() {
            self.committed = Some(self.committed.map_or(offset, |current| current.max(offset)));
        }

        self.metrics.record_flush(&report);
        logging::log_flush_operation(&report);

        // Having no subscribers is not an error
        let _ = self.reports.send(report);

        self.refresh_state();
    }

    /// Forced flush of everything accepted so far, then termination
    async fn drain(mut self) -> PartitionSummary {
        self.transition(PartitionState::Draining);
        logging::log_partition_lifecycle(
            lifecycle::PARTITION_DRAINING,
            self.partition,
            Some(&format!("{} buffered", self.window.len())),
        );

        // Messages already accepted by ingest are flushed, not dropped
        self.inbound.close();
        while let Ok(message) = self.inbound.try_recv() {
            self.admit(message).await;
        }

        while !self.window.is_empty() {
            self.start_flush(FlushTrigger::Drain).await;
        }
        self.await_in_flight().await;

        self.transition(PartitionState::Terminated);
        logging::log_partition_lifecycle(
            lifecycle::PARTITION_TERMINATED,
            self.partition,
            self.committed
                .map(|offset| format!("committed offset {offset}"))
                .as_deref(),
        );

        PartitionSummary {
            partition: self.partition,
            committed_offset: self.committed,
            metrics: self.metrics,
        }
    }

    /// Derive the live state from the window and in-flight flush
    fn refresh_state(&mut self) {
        let current = *self.state.borrow();
        if !current.accepts_messages() {
            return;
        }

        let next = if self.in_flight.is_some() {
            PartitionState::Flushing
        } else if self.window.is_empty() {
            PartitionState::Idle
        } else {
            PartitionState::Accumulating
        };
        self.transition(next);
    }

    fn transition(&mut self, next: PartitionState) {
        let current = *self.state.borrow();
        if current == next {
            return;
        }

        if !current.can_transition_to(next) {
            warn!(
                partition = %self.partition,
                from = %current,
                to = %next,
                "WORKER: Ignoring invalid state transition"
            );
            return;
        }

        debug!(partition = %self.partition, from = %current, to = %next, "WORKER: State transition");
        self.state.send_replace(next);
    }
}

async fn join_in_flight(in_flight: &mut Option<InFlightFlush>) -> Result<FlushReport, JoinError> {
    match in_flight {
        Some(flight) => (&mut flight.handle).await,
        None => future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
