//! Payload shapes for the built-in chat events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `send_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageEvent {
    pub message: String,
    pub from: String,
}

/// Payload of `new_message`, fanned out to every member of the sender's room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessageEvent {
    pub message: String,
    pub from: String,
    pub sent: DateTime<Utc>,
}

impl NewMessageEvent {
    pub fn stamped(message: SendMessageEvent) -> Self {
        Self {
            message: message.message,
            from: message.from,
            sent: Utc::now(),
        }
    }
}

/// Payload of `change_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRoomEvent {
    pub name: String,
}
