//! Built-in chat handlers.

use std::sync::Arc;

use chatwire_protocol::{
    ChangeRoomEvent, Event, EventError, EventTypes, NewMessageEvent, SendMessageEvent,
};
use chatwire_transport::Connection;
use tracing::debug;

use crate::handler::{EventHandler, HandlerResult};
use crate::registry::Registry;

/// `send_message`: stamp the message and deliver it as `new_message` to
/// everyone in the sender's room, the sender included.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendMessageHandler;

impl EventHandler for SendMessageHandler {
    async fn handle(
        &self,
        event: Event,
        sender: &Arc<Connection>,
        registry: &Registry,
    ) -> HandlerResult {
        let message: SendMessageEvent = event.decode_payload()?;
        let outgoing = Event::from_payload(EventTypes::NEW_MESSAGE, &NewMessageEvent::stamped(message))
            .map_err(|e| EventError::handler(format!("failed to encode new_message: {e}")))?;

        let room = sender.room();
        let delivered = registry.broadcast_to_room(room.as_deref(), &outgoing);
        debug!(
            connection = %sender.id(),
            room = room.as_deref().unwrap_or("-"),
            "Message delivered to {delivered} clients"
        );
        Ok(())
    }
}

/// `change_room`: move the sender into the named room.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeRoomHandler;

impl EventHandler for ChangeRoomHandler {
    async fn handle(
        &self,
        event: Event,
        sender: &Arc<Connection>,
        _registry: &Registry,
    ) -> HandlerResult {
        let ChangeRoomEvent { name } = event.decode_payload()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EventError::handler("room name must not be empty"));
        }

        debug!(connection = %sender.id(), room = name, "Changed room");
        sender.set_room(Some(name.to_string()));
        Ok(())
    }
}
