//! The event handler capability and its object-safe wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chatwire_protocol::{Event, EventError};
use chatwire_transport::Connection;

use crate::registry::Registry;

/// Result of handling one event.
pub type HandlerResult = Result<(), EventError>;

/// Trait implemented by everything the registry can route an event to.
///
/// The handler receives the raw envelope and decodes the payload itself
/// (see [`Event::decode_payload`]). `sender` is the connection the event
/// arrived on; `registry` is there for handlers that reply to other
/// connections.
pub trait EventHandler: Send + Sync {
    fn handle(
        &self,
        event: Event,
        sender: &Arc<Connection>,
        registry: &Registry,
    ) -> impl Future<Output = HandlerResult> + Send;
}

/// Object-safe wrapper for the EventHandler trait.
pub(crate) trait EventHandlerDyn: Send + Sync {
    fn handle_dyn<'a>(
        &'a self,
        event: Event,
        sender: &'a Arc<Connection>,
        registry: &'a Registry,
    ) -> Pin<Box<dyn Future<Output = HandlerResult> + Send + 'a>>;
}

impl<T: EventHandler> EventHandlerDyn for T {
    fn handle_dyn<'a>(
        &'a self,
        event: Event,
        sender: &'a Arc<Connection>,
        registry: &'a Registry,
    ) -> Pin<Box<dyn Future<Output = HandlerResult> + Send + 'a>> {
        Box::pin(self.handle(event, sender, registry))
    }
}
