mod common;

use batch_window::orchestration::{BatchWindow, TriggerDecision};
use batch_window::{InboundMessage, PartitionId};
use common::{settle, Harness};
use proptest::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

fn offsets(batches: &[Vec<InboundMessage>]) -> Vec<i64> {
    batches.iter().flatten().map(InboundMessage::offset).collect()
}

proptest! {
    /// Property: N messages with a size limit of k and no elapsed time give
    /// exactly ⌊N/k⌋ full batches, N mod k buffered, arrival order preserved
    #[test]
    fn size_trigger_yields_floor_n_over_k_batches(n in 0_i64..300, k in 1_usize..25) {
        let now = Instant::now();
        let mut window = BatchWindow::new(PartitionId(0), k, Duration::from_secs(60));
        let mut flushed = Vec::new();

        for offset in 1..=n {
            let decision = window.admit(InboundMessage::new(PartitionId(0), offset, ""), now);
            prop_assert_ne!(decision, TriggerDecision::FlushBeforeAdmit);
            if decision.requires_flush() {
                flushed.push(window.drain_for_flush());
            }
            prop_assert!(window.len() <= k);
        }

        prop_assert_eq!(flushed.len() as i64, n / k as i64);
        prop_assert!(flushed.iter().all(|batch| batch.len() == k));
        prop_assert_eq!(window.len() as i64, n % k as i64);
        prop_assert!(!window.check_timeout(now));

        let mut all = offsets(&flushed);
        all.extend(window.drain_for_flush().iter().map(InboundMessage::offset));
        prop_assert_eq!(all, (1..=n).collect::<Vec<_>>());
    }

    /// Property: a non-empty window times out exactly when time_limit has elapsed since it opened
    #[test]
    fn time_trigger_fires_at_deadline(limit_ms in 1_u64..10_000, before in 0_u64..10_000) {
        let opened = Instant::now();
        let limit = Duration::from_millis(limit_ms);
        let mut window = BatchWindow::new(PartitionId(0), 1000, limit);

        prop_assert!(!window.check_timeout(opened + limit));
        window.admit(InboundMessage::new(PartitionId(0), 1, ""), opened);

        prop_assert_eq!(window.deadline(), Some(opened + limit));
        let checked_at = opened + Duration::from_millis(before);
        prop_assert_eq!(window.check_timeout(checked_at), before >= limit_ms);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: through the engine, every message is processed exactly once,
    /// in order, in batches of at most k, and the final checkpoint is N
    #[test]
    fn engine_processes_every_message_once_in_order(n in 1_i64..120, k in 1_usize..15) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        let (batches, history) = runtime.block_on(async {
            let harness = Harness::new(k, Duration::from_secs(3600));
            harness.engine.claim_partition(PartitionId(0)).unwrap();
            harness.send_range(0, 1..=n).await;
            settle().await;
            harness.engine.shutdown().await;
            (harness.processor.batches(), harness.checkpointer.history_for(PartitionId(0)))
        });

        prop_assert!(batches.iter().all(|batch| !batch.is_empty() && batch.len() <= k));
        prop_assert_eq!(batches.len() as i64, (n + k as i64 - 1) / k as i64);
        prop_assert_eq!(batches.concat(), (1..=n).collect::<Vec<_>>());
        prop_assert!(history.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert_eq!(history.last().copied(), Some(n));
    }
}
