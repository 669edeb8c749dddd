use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one partition worker.
///
/// ```text
/// Idle ──admit──→ Accumulating ──trigger──→ Flushing ──complete──→ Idle
///   │                  │                        │
///   └──────────────────┴──── revoke/shutdown ───┴──→ Draining ──→ Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionState {
    /// Window empty, waiting for the next message or tick
    Idle,
    /// Window non-empty, below the size threshold, deadline armed
    Accumulating,
    /// A drained batch is being decoded, processed and checkpointed
    Flushing,
    /// Forced flush of whatever is buffered before termination
    Draining,
    /// Window and checkpoint state discarded; no further messages accepted
    Terminated,
}

impl PartitionState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Whether the worker still accepts inbound messages
    pub fn accepts_messages(&self) -> bool {
        matches!(self, Self::Idle | Self::Accumulating | Self::Flushing)
    }

    /// Check whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: PartitionState) -> bool {
        use PartitionState::*;

        match (self, next) {
            (Terminated, _) => false,
            (Draining, Terminated) => true,
            (Draining, _) => false,
            (_, Draining) => true,
            (_, Terminated) => false,
            (Idle, Accumulating) | (Idle, Flushing) => true,
            (Accumulating, Flushing) => true,
            // A new window may fill (or the in-flight flush may finish) in any order
            (Flushing, Idle) | (Flushing, Accumulating) => true,
            // Size limit of one: a message can be admitted and flushed without lingering
            (Accumulating, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Accumulating => write!(f, "accumulating"),
            Self::Flushing => write!(f, "flushing"),
            Self::Draining => write!(f, "draining"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

impl std::str::FromStr for PartitionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "accumulating" => Ok(Self::Accumulating),
            "flushing" => Ok(Self::Flushing),
            "draining" => Ok(Self::Draining),
            "terminated" => Ok(Self::Terminated),
            _ => Err(format!("Invalid partition state: {s}")),
        }
    }
}
