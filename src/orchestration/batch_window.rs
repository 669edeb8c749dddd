//! # Batch Window
//!
//! In-progress batch for one partition with dual-trigger admission:
//!
//! - **Size trigger**: admitting the `size_limit`-th message asks for an
//!   immediate flush that includes it, so the window never exceeds the limit.
//! - **Time trigger**: the window opens when its first message is admitted and
//!   must flush once `time_limit` has elapsed since then.
//!
//! The window is a plain synchronous structure; all timing is driven by the
//! `now` the caller passes in, which keeps it deterministic under test.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::WindowConfig;
use crate::messaging::{InboundMessage, PartitionId};

/// What the caller must do after admitting a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Keep accumulating
    None,
    /// The window was already full; flush it, the message is held back and
    /// becomes part of the next window
    FlushBeforeAdmit,
    /// Size threshold reached; flush now, batch boundary includes this message
    FlushAfterAdmit,
}

impl TriggerDecision {
    pub fn requires_flush(&self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Debug)]
pub struct BatchWindow {
    partition: PartitionId,
    /// Insertion order is arrival order
    buffered: Vec<InboundMessage>,
    /// Admission time of the first message since the last flush
    opened_at: Option<Instant>,
    /// Messages that arrived while the window was full, with their arrival time
    held_back: VecDeque<(InboundMessage, Instant)>,
    size_limit: usize,
    time_limit: Duration,
}

impl BatchWindow {
    pub fn new(partition: PartitionId, size_limit: usize, time_limit: Duration) -> Self {
        Self {
            partition,
            buffered: Vec::with_capacity(size_limit),
            opened_at: None,
            held_back: VecDeque::new(),
            size_limit: size_limit.max(1),
            time_limit,
        }
    }

    pub fn from_config(partition: PartitionId, config: &WindowConfig) -> Self {
        Self::new(partition, config.size_limit, config.time_limit())
    }

    /// Admit a message, starting the time trigger if the window was empty
    pub fn admit(&mut self, message: InboundMessage, now: Instant) -> TriggerDecision {
        if self.is_full() || !self.held_back.is_empty() {
            self.held_back.push_back((message, now));
            return TriggerDecision::FlushBeforeAdmit;
        }

        if self.buffered.is_empty() {
            self.opened_at = Some(now);
        }
        self.buffered.push(message);

        if self.is_full() {
            TriggerDecision::FlushAfterAdmit
        } else {
            TriggerDecision::None
        }
    }

    /// True iff the window is non-empty and `time_limit` has elapsed since it opened
    pub fn check_timeout(&self, now: Instant) -> bool {
        match self.opened_at {
            Some(opened_at) if !self.buffered.is_empty() => {
                now.saturating_duration_since(opened_at) >= self.time_limit
            }
            _ => false,
        }
    }

    /// Instant at which the time trigger fires, if the window is open
    pub fn deadline(&self) -> Option<Instant> {
        self.opened_at.map(|opened_at| opened_at + self.time_limit)
    }

    /// Take the buffered batch and reset the window.
    ///
    /// Held-back messages are re-admitted into the fresh window, keeping their
    /// original arrival time so the time trigger still measures from arrival.
    pub fn drain_for_flush(&mut self) -> Vec<InboundMessage> {
        let batch = std::mem::replace(&mut self.buffered, Vec::with_capacity(self.size_limit));
        self.opened_at = None;

        while !self.is_full() {
            let Some((message, arrived_at)) = self.held_back.pop_front() else {
                break;
            };
            if self.buffered.is_empty() {
                self.opened_at = Some(arrived_at);
            }
            self.buffered.push(message);
        }

        batch
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Buffered messages, excluding held-back ones
    pub fn len(&self) -> usize {
        self.buffered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffered.len() >= self.size_limit
    }

    /// Whether any message (buffered or held back) is waiting for a flush
    pub fn has_pending(&self) -> bool {
        !self.buffered.is_empty() || !self.held_back.is_empty()
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }
}
