//! Chatwire transport layer
//!
//! Owns everything that touches a socket:
//! - Connection lifecycle (upgrade, register, read/write loops, teardown)
//! - Heartbeat pings and the pong read deadline
//! - The single-writer outbound queue per connection
//! - The HTTP server hosting the upgrade, health, and static routes
//!
//! Routing and membership live behind the `ConnectionHub` trait so the
//! transport never depends on the server crate.

pub mod connection;
pub mod hub;
pub mod server;

pub use connection::{Connection, ConnectionConfig, ConnectionHandles, ConnectionId};
pub use hub::ConnectionHub;
pub use server::{TransportConfig, TransportError, TransportServer};
