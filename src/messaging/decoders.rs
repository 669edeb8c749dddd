//! Stock decoders for common payload encodings

use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

use crate::error::DecodeError;
use crate::messaging::InboundMessage;
use crate::orchestration::traits::Decoder;

/// Decodes message values as JSON into `T`
pub struct JsonDecoder<T> {
    _event: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    pub fn new() -> Self {
        Self {
            _event: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDecoder")
            .field("event", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Decoder for JsonDecoder<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Event = T;

    fn decode(&self, message: &InboundMessage) -> Result<T, DecodeError> {
        if message.value().is_empty() {
            return Err(DecodeError::new("empty payload"));
        }
        Ok(serde_json::from_slice(message.value())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::PartitionId;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct OrderEvent {
        order_id: String,
        amount: f64,
    }

    #[test]
    fn test_decodes_valid_json() {
        let decoder = JsonDecoder::<OrderEvent>::new();
        let message = InboundMessage::new(
            PartitionId(0),
            1,
            br#"{"order_id":"o-1","amount":12.5}"#.to_vec(),
        );

        let event = decoder.decode(&message).unwrap();
        assert_eq!(
            event,
            OrderEvent {
                order_id: "o-1".to_string(),
                amount: 12.5
            }
        );
    }

    #[test]
    fn test_malformed_json_is_a_decode_error() {
        let decoder = JsonDecoder::<OrderEvent>::new();
        let message = InboundMessage::new(PartitionId(0), 2, b"not json".to_vec());

        assert!(decoder.decode(&message).is_err());
    }

    #[test]
    fn test_empty_payload_is_a_decode_error() {
        let decoder = JsonDecoder::<OrderEvent>::new();
        let message = InboundMessage::new(PartitionId(0), 3, Vec::new());

        assert_eq!(
            decoder.decode(&message).unwrap_err(),
            DecodeError::new("empty payload")
        );
    }
}
