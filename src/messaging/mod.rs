//! # Messaging Module
//!
//! Inbound message records delivered by the upstream source, and stock decoders.

pub mod decoders;
pub mod message;

pub use decoders::JsonDecoder;
pub use message::{InboundMessage, MessageHeader, PartitionId};
