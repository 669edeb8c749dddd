//! # Inbound Message Structures
//!
//! Defines the immutable record handed to the engine for every message the
//! upstream source delivers from a partition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an independently ordered sub-stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(pub i32);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for PartitionId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// A single name/value header, kept in delivery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: Vec<u8>,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Message consumed from one partition.
///
/// Fields are private so a message cannot change once constructed; use the
/// `with_*` builders while assembling it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    partition: PartitionId,
    /// Unique and monotonic within the partition
    offset: i64,
    key: Option<Vec<u8>>,
    value: Vec<u8>,
    headers: Vec<MessageHeader>,
    timestamp: DateTime<Utc>,
    /// Source-assigned delivery sequence
    arrival_sequence: u64,
}

impl InboundMessage {
    /// Create a message with no key or headers, timestamped now
    pub fn new(partition: PartitionId, offset: i64, value: impl Into<Vec<u8>>) -> Self {
        Self {
            partition,
            offset,
            key: None,
            value: value.into(),
            headers: Vec::new(),
            timestamp: Utc::now(),
            arrival_sequence: 0,
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, header: MessageHeader) -> Self {
        self.headers.push(header);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_arrival_sequence(mut self, sequence: u64) -> Self {
        self.arrival_sequence = sequence;
        self
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn headers(&self) -> &[MessageHeader] {
        &self.headers
    }

    /// First header with the given name
    pub fn header(&self, name: &str) -> Option<&MessageHeader> {
        self.headers.iter().find(|h| h.name == name)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn arrival_sequence(&self) -> u64 {
        self.arrival_sequence
    }
}
