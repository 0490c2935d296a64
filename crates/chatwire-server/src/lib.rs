//! Chatwire server — tracks live connections and routes their events.
//!
//! The `Registry` implements the transport's `ConnectionHub`: it owns the
//! connection set, dispatches inbound events to handlers by type tag, and
//! fans outbound events out to one connection, a room, or everyone.

pub mod handler;
pub mod handlers;
pub mod registry;

pub use chatwire_transport::ConnectionHub;
pub use handler::EventHandler;
pub use handlers::{ChangeRoomHandler, SendMessageHandler};
pub use registry::{Registry, RegistryBuilder};
