use async_trait::async_trait;
use batch_window::orchestration::BatchWindow;
use batch_window::{
    BatchProcessor, DecodedBatch, InMemoryCheckpointer, InboundMessage, JsonDecoder, PartitionId,
    WindowConfig, WindowEngine,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct Discard;

#[async_trait]
impl BatchProcessor<serde_json::Value> for Discard {
    async fn process(&self, batch: &DecodedBatch<serde_json::Value>) -> anyhow::Result<()> {
        black_box(batch.len());
        Ok(())
    }
}

fn benchmark_window_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_admission");
    for size_limit in [10_usize, 100, 1000] {
        group.throughput(Throughput::Elements(10_000));
        group.bench_with_input(
            BenchmarkId::from_parameter(size_limit),
            &size_limit,
            |b, &size_limit| {
                b.iter(|| {
                    let now = Instant::now();
                    let mut window =
                        BatchWindow::new(PartitionId(0), size_limit, Duration::from_secs(5));
                    for offset in 0..10_000 {
                        let message = InboundMessage::new(PartitionId(0), offset, "");
                        if window.admit(message, now).requires_flush() {
                            black_box(window.drain_for_flush());
                        }
                    }
                });
            },
        );
    }
    group.finish();
}

fn benchmark_engine_ingest(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let payload = br#"{"order_id":42,"amount_cents":1999}"#.to_vec();

    let mut group = c.benchmark_group("engine_ingest");
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("json_4_partitions", |b| {
        b.to_async(&runtime).iter(|| async {
            let engine = WindowEngine::new(
                WindowConfig::new(100, Duration::from_secs(1)).expect("valid config"),
                JsonDecoder::<serde_json::Value>::new(),
                Arc::new(Discard),
                Arc::new(InMemoryCheckpointer::new()),
            )
            .expect("engine");

            for partition in 0..4 {
                engine.claim_partition(PartitionId(partition)).expect("claim");
            }
            for offset in 0..1_000_i64 {
                let partition = PartitionId((offset % 4) as i32);
                engine
                    .ingest(InboundMessage::new(partition, offset, payload.clone()))
                    .await
                    .expect("ingest");
            }
            black_box(engine.shutdown().await);
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_window_admission, benchmark_engine_ingest);
criterion_main!(benches);
