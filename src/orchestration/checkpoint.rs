//! In-memory checkpoint sink for hosts without durable offset storage, and for tests.
//!
//! Only the latest offset per partition is kept indefinitely. The commit
//! history is bounded; the oldest entries are evicted once it is full.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::constants::DEFAULT_CHECKPOINT_HISTORY;
use crate::messaging::PartitionId;
use crate::orchestration::traits::Checkpointer;

#[derive(Debug)]
pub struct InMemoryCheckpointer {
    offsets: DashMap<PartitionId, i64>,
    history: Mutex<VecDeque<(PartitionId, i64)>>,
    history_limit: usize,
}

impl Default for InMemoryCheckpointer {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_CHECKPOINT_HISTORY)
    }
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain at most `limit` commits in the history (0 disables it)
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            offsets: DashMap::new(),
            history: Mutex::new(VecDeque::with_capacity(limit.min(DEFAULT_CHECKPOINT_HISTORY))),
            history_limit: limit,
        }
    }

    /// Last committed offset for the partition
    pub fn committed(&self, partition: PartitionId) -> Option<i64> {
        self.offsets.get(&partition).map(|offset| *offset)
    }

    /// Retained commits in the order they were received
    pub fn history(&self) -> Vec<(PartitionId, i64)> {
        self.history.lock().iter().copied().collect()
    }

    /// Retained commits for one partition, oldest first
    pub fn history_for(&self, partition: PartitionId) -> Vec<i64> {
        self.history
            .lock()
            .iter()
            .filter(|(p, _)| *p == partition)
            .map(|(_, offset)| *offset)
            .collect()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn commit(&self, partition: PartitionId, offset: i64) -> anyhow::Result<()> {
        self.offsets.insert(partition, offset);

        if self.history_limit > 0 {
            let mut history = self.history.lock();
            if history.len() == self.history_limit {
                history.pop_front();
            }
            history.push_back((partition, offset));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_ok, block_on};

    #[test]
    fn test_tracks_latest_offset_and_history() {
        let checkpointer = InMemoryCheckpointer::new();

        block_on(async {
            assert_ok!(checkpointer.commit(PartitionId(0), 3).await);
            assert_ok!(checkpointer.commit(PartitionId(1), 10).await);
            assert_ok!(checkpointer.commit(PartitionId(0), 6).await);
        });

        assert_eq!(checkpointer.committed(PartitionId(0)), Some(6));
        assert_eq!(checkpointer.committed(PartitionId(2)), None);
        assert_eq!(checkpointer.history_for(PartitionId(0)), vec![3, 6]);
        assert_eq!(checkpointer.history().len(), 3);
    }

    #[test]
    fn test_history_is_bounded() {
        let checkpointer = InMemoryCheckpointer::with_history_limit(2);

        block_on(async {
            for offset in 1..=5 {
                assert_ok!(checkpointer.commit(PartitionId(0), offset).await);
            }
        });

        assert_eq!(checkpointer.history_for(PartitionId(0)), vec![4, 5]);
        assert_eq!(checkpointer.committed(PartitionId(0)), Some(5));
    }

    #[test]
    fn test_zero_limit_keeps_no_history() {
        let checkpointer = InMemoryCheckpointer::with_history_limit(0);

        assert_ok!(block_on(checkpointer.commit(PartitionId(7), 42)));

        assert!(checkpointer.history().is_empty());
        assert_eq!(checkpointer.committed(PartitionId(7)), Some(42));
    }
}
