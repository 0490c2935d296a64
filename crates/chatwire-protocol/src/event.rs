//! The `{type, payload}` envelope carried by every application frame.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventError;

/// A typed event. The payload stays an untyped JSON value until the
/// matching handler decodes it with [`Event::decode_payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Build an event from any serializable payload.
    pub fn from_payload<T: Serialize>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event_type, serde_json::to_value(payload)?))
    }

    /// Parse a frame body into an envelope.
    pub fn decode(frame: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(frame).map_err(EventError::Decode)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode the payload into the shape the handler expects.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        T::deserialize(&self.payload).map_err(|source| EventError::InvalidPayload {
            event_type: self.event_type.clone(),
            source,
        })
    }
}
