//! Event type tag constants.

/// Type tags understood by the built-in handlers, plus the ones the server
/// emits.
pub struct EventTypes;

impl EventTypes {
    // ── Client → Server ─────────────────────────────────────────────────
    pub const SEND_MESSAGE: &str = "send_message";
    pub const CHANGE_ROOM: &str = "change_room";

    // ── Server → Client ─────────────────────────────────────────────────
    pub const NEW_MESSAGE: &str = "new_message";
}

/// Type alias for event type tags.
pub type EventName = &'static str;

/// Every tag a client may send to a server with the default handler set.
pub const INBOUND_EVENTS: &[EventName] = &[EventTypes::SEND_MESSAGE, EventTypes::CHANGE_ROOM];

pub fn is_inbound_event(event_type: &str) -> bool {
    INBOUND_EVENTS.contains(&event_type)
}
