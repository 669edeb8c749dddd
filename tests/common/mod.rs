//! Shared fakes for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use batch_window::{
    BatchProcessor, Checkpointer, DecodeError, DecodedBatch, Decoder, InMemoryCheckpointer,
    InboundMessage, PartitionId, WindowConfig, WindowEngine,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Decodes the payload as a UTF-8 integer
#[derive(Debug, Default)]
pub struct NumberDecoder;

impl Decoder for NumberDecoder {
    type Event = i64;

    fn decode(&self, message: &InboundMessage) -> Result<i64, DecodeError> {
        std::str::from_utf8(message.value())
            .map_err(|e| DecodeError::new(e.to_string()))?
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| DecodeError::new(e.to_string()))
    }
}

/// Records every batch it sees, optionally slowly or failing
#[derive(Debug, Default)]
pub struct RecordingProcessor {
    batches: Mutex<Vec<Vec<i64>>>,
    started_at: Mutex<Vec<Instant>>,
    fail_on: HashSet<i64>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any batch containing one of these events
    pub fn failing_on(events: &[i64]) -> Self {
        Self {
            fail_on: events.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<i64>> {
        self.batches.lock().clone()
    }

    pub fn started_at(&self) -> Vec<Instant> {
        self.started_at.lock().clone()
    }

    /// Highest number of overlapping `process` calls observed
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchProcessor<i64> for RecordingProcessor {
    async fn process(&self, batch: &DecodedBatch<i64>) -> anyhow::Result<()> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        self.started_at.lock().push(Instant::now());
        let events: Vec<i64> = batch.events().copied().collect();
        self.batches.lock().push(events.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if events.iter().any(|event| self.fail_on.contains(event)) {
            anyhow::bail!("downstream rejected batch ending at {}", batch.last_offset);
        }
        Ok(())
    }
}

/// Checkpointer that always fails
#[derive(Debug, Default)]
pub struct UnavailableCheckpointer;

#[async_trait]
impl Checkpointer for UnavailableCheckpointer {
    async fn commit(&self, _partition: PartitionId, _offset: i64) -> anyhow::Result<()> {
        anyhow::bail!("offset store unavailable")
    }
}

pub struct Harness {
    pub engine: WindowEngine<NumberDecoder>,
    pub processor: Arc<RecordingProcessor>,
    pub checkpointer: Arc<InMemoryCheckpointer>,
}

impl Harness {
    pub fn new(size_limit: usize, time_limit: Duration) -> Self {
        Self::with_processor(size_limit, time_limit, RecordingProcessor::new())
    }

    pub fn with_processor(
        size_limit: usize,
        time_limit: Duration,
        processor: RecordingProcessor,
    ) -> Self {
        let config = WindowConfig::new(size_limit, time_limit).expect("valid test config");
        let processor = Arc::new(processor);
        let checkpointer = Arc::new(InMemoryCheckpointer::new());
        let engine = WindowEngine::new(
            config,
            NumberDecoder,
            processor.clone(),
            checkpointer.clone(),
        )
        .expect("engine should build");

        Self {
            engine,
            processor,
            checkpointer,
        }
    }

    /// Ingest `offset` with its own number as payload
    pub async fn send(&self, partition: i32, offset: i64) {
        self.engine
            .ingest(number(partition, offset))
            .await
            .expect("ingest should succeed");
    }

    pub async fn send_range(&self, partition: i32, offsets: std::ops::RangeInclusive<i64>) {
        for offset in offsets {
            self.send(partition, offset).await;
        }
    }
}

pub fn number(partition: i32, offset: i64) -> InboundMessage {
    InboundMessage::new(PartitionId(partition), offset, offset.to_string())
}

pub fn raw(partition: i32, offset: i64, payload: &str) -> InboundMessage {
    InboundMessage::new(PartitionId(partition), offset, payload)
}

/// Let spawned workers and flush tasks run to quiescence under a paused clock
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
