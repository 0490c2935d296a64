//! Chatwire protocol types
//!
//! Every application frame on the wire is a JSON envelope with a `type`
//! tag and an opaque `payload`. This crate owns the envelope, the known
//! event names, the payload shapes for the built-in chat events, the error
//! taxonomy, and the connection limits shared by server and clients.

pub mod error;
pub mod event;
pub mod events;
pub mod limits;
pub mod messages;

pub use error::EventError;
pub use event::Event;
pub use events::{EventName, EventTypes};
pub use limits::{CLOSE_GRACE, HEARTBEAT_TIMEOUT, MAX_FRAME_BYTES, heartbeat_interval};
pub use messages::{ChangeRoomEvent, NewMessageEvent, SendMessageEvent};
