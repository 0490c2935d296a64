//! The seam between a connection's loops and whoever owns the connection set.

use std::future::Future;
use std::sync::Arc;

use axum::extract::ws::WebSocket;
use chatwire_protocol::{Event, EventError};

use crate::connection::{self, Connection, ConnectionConfig};

/// Implemented by the registry that tracks live connections.
///
/// Both loops of every connection hold an `Arc` to the hub: the read loop
/// routes decoded events through it, and both loops deregister through it
/// when they exit.
pub trait ConnectionHub: Send + Sync + 'static {
    /// Insert a freshly upgraded connection. Re-adding is a no-op.
    fn add_connection(&self, connection: Arc<Connection>);

    /// Close and forget a connection. Returns `false` if it was not present.
    fn remove_connection(&self, connection: &Connection) -> bool;

    /// Dispatch an inbound event sent by `sender`.
    fn route_event(
        &self,
        event: Event,
        sender: &Arc<Connection>,
    ) -> impl Future<Output = Result<(), EventError>> + Send;

    /// Number of live connections.
    fn connection_count(&self) -> usize;

    /// Register an upgraded socket and start its read and write loops.
    fn accept_connection(self: &Arc<Self>, socket: WebSocket, config: ConnectionConfig) -> Arc<Connection>
    where
        Self: Sized,
    {
        connection::accept_connection(socket, Arc::clone(self), config)
    }
}
