//! Registry: the set of live connections and the event handler table.

use std::collections::HashMap;
use std::sync::Arc;

use chatwire_protocol::{Event, EventError, EventTypes};
use chatwire_transport::{Connection, ConnectionHub, ConnectionId};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::handler::{EventHandler, EventHandlerDyn};
use crate::handlers::{ChangeRoomHandler, SendMessageHandler};

/// Builds a [`Registry`]. Handlers can only be registered here, before the
/// registry is shared with the transport.
pub struct RegistryBuilder {
    handlers: HashMap<String, Box<dyn EventHandlerDyn>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Route events tagged `event_type` to `handler`. A later registration
    /// for the same tag replaces the earlier one.
    pub fn register_handler<H: EventHandler + 'static>(
        mut self,
        event_type: impl Into<String>,
        handler: H,
    ) -> Self {
        let event_type = event_type.into();
        info!("Registering handler: {event_type}");
        if self.handlers.insert(event_type.clone(), Box::new(handler)).is_some() {
            warn!("Handler for {event_type} replaced");
        }
        self
    }

    /// Register the built-in chat handlers.
    pub fn with_default_handlers(self) -> Self {
        self.register_handler(EventTypes::SEND_MESSAGE, SendMessageHandler)
            .register_handler(EventTypes::CHANGE_ROOM, ChangeRoomHandler)
    }

    pub fn build(self) -> Arc<Registry> {
        Arc::new(Registry {
            connections: Mutex::new(HashMap::new()),
            handlers: self.handlers,
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds every live connection and routes their events.
///
/// One mutex guards the whole connection set; it is never held across an
/// await, and sending to a connection only enqueues, so broadcasts iterate
/// under the lock.
pub struct Registry {
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
    handlers: HashMap<String, Box<dyn EventHandlerDyn>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// A registry with the built-in chat handlers.
    pub fn with_default_handlers() -> Arc<Self> {
        RegistryBuilder::new().with_default_handlers().build()
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains_key(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.lock().get(&id).cloned()
    }

    /// Snapshot of the live connections.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.lock().values().cloned().collect()
    }

    /// Registered type tags, sorted.
    pub fn handler_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Queue `event` for a single connection.
    pub fn send_to(&self, id: ConnectionId, event: Event) -> Result<(), EventError> {
        match self.get(id) {
            Some(connection) => connection.send(event),
            None => Err(EventError::ConnectionClosed),
        }
    }

    /// Queue `event` for every live connection. Returns how many accepted it.
    pub fn broadcast(&self, event: &Event) -> usize {
        let connections = self.connections.lock();
        connections
            .values()
            .filter(|c| c.send(event.clone()).is_ok())
            .count()
    }

    /// Queue `event` for every connection in `room` (`None` targets
    /// connections that have not joined a room).
    pub fn broadcast_to_room(&self, room: Option<&str>, event: &Event) -> usize {
        let connections = self.connections.lock();
        connections
            .values()
            .filter(|c| c.in_room(room))
            .filter(|c| c.send(event.clone()).is_ok())
            .count()
    }

    /// Close and forget every connection. Used on process shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.connections.lock().drain().collect();
        for (_, connection) in &drained {
            connection.close();
        }
        info!("Closed {} connections", drained.len());
        drained.len()
    }
}

impl ConnectionHub for Registry {
    fn add_connection(&self, connection: Arc<Connection>) {
        let mut connections = self.connections.lock();
        connections.entry(connection.id()).or_insert(connection);
    }

    fn remove_connection(&self, connection: &Connection) -> bool {
        let mut connections = self.connections.lock();
        let Some(removed) = connections.remove(&connection.id()) else {
            return false;
        };

        if !removed.close() {
            debug!(connection = %removed.id(), "Connection was already closed");
        }
        info!(
            connection = %removed.id(),
            "Client disconnected (total: {})",
            connections.len()
        );
        true
    }

    async fn route_event(&self, event: Event, sender: &Arc<Connection>) -> Result<(), EventError> {
        let Some(handler) = self.handlers.get(&event.event_type) else {
            return Err(EventError::Unsupported(event.event_type));
        };
        handler.handle_dyn(event, sender, self).await
    }

    fn connection_count(&self) -> usize {
        self.len()
    }
}
