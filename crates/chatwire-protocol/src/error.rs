//! Error taxonomy for inbound event handling.

use thiserror::Error;

/// Failures produced while decoding, routing, or handling an event.
///
/// Only [`EventError::Decode`] is fatal to a connection: a frame that is not
/// a valid envelope ends that connection's read loop. Everything else is
/// logged and the connection keeps serving.
#[derive(Debug, Error)]
pub enum EventError {
    /// The frame is not a valid `{type, payload}` envelope.
    #[error("malformed event: {0}")]
    Decode(#[source] serde_json::Error),

    /// No handler is registered for this type tag.
    #[error("this event type is not supported: {0}")]
    Unsupported(String),

    /// The handler could not decode the payload into its expected shape.
    #[error("invalid payload for {event_type}: {source}")]
    InvalidPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// The handler rejected the event.
    #[error("{0}")]
    Handler(String),

    /// The target connection's outbound queue is already closed.
    #[error("connection is closed")]
    ConnectionClosed,
}

impl EventError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Whether this error should end the connection that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
