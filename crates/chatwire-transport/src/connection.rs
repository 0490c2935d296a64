//! One upgraded WebSocket and its two loops.
//!
//! Every connection runs exactly two tasks. The read loop owns the stream
//! half, enforces the pong deadline, and routes decoded events through the
//! hub. The write loop owns the sink half and is the only code that ever
//! writes to the socket; everyone else enqueues onto the connection's
//! outbound queue. Whichever loop exits first deregisters the connection,
//! which closes the queue and signals the other loop to stop. Once closed,
//! the write loop gets `close_grace` to flush; a send still pending after
//! that is abandoned and the socket dropped.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use bytes::Bytes;
use chatwire_protocol::{
    CLOSE_GRACE, Event, EventError, HEARTBEAT_TIMEOUT, MAX_FRAME_BYTES, heartbeat_interval,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::hub::ConnectionHub;

/// Unique identifier for a connection.
pub type ConnectionId = uuid::Uuid;

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Largest inbound message, in bytes
    pub max_frame_bytes: usize,
    /// Time allowed between pongs before the connection is dropped
    pub heartbeat_timeout: Duration,
    /// Time between pings; must be shorter than `heartbeat_timeout`
    pub heartbeat_interval: Duration,
    /// How long writes may still take after the connection is closed
    pub close_grace: Duration,
}

impl ConnectionConfig {
    /// Config for a given pong deadline, pinging at 90% of it.
    pub fn with_heartbeat_timeout(timeout: Duration) -> Self {
        Self {
            heartbeat_timeout: timeout,
            heartbeat_interval: heartbeat_interval(timeout),
            ..Self::default()
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_BYTES,
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
            heartbeat_interval: heartbeat_interval(HEARTBEAT_TIMEOUT),
            close_grace: CLOSE_GRACE,
        }
    }
}

/// A connected client.
///
/// Holds the producer side of the outbound queue and the signal that
/// stops both loops. The socket halves themselves are owned by the loops.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    egress: Mutex<Option<mpsc::UnboundedSender<Event>>>,
    closing: watch::Sender<bool>,
    room: RwLock<Option<String>>,
}

/// The consumer ends handed to the loops when a connection is created.
#[derive(Debug)]
pub struct ConnectionHandles {
    /// Outbound queue, drained only by the write loop
    pub egress: mpsc::UnboundedReceiver<Event>,
    /// Flips to `true` when the connection is closed
    pub closed: watch::Receiver<bool>,
}

impl Connection {
    pub fn new() -> (Arc<Self>, ConnectionHandles) {
        let (egress_tx, egress_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);

        let connection = Arc::new(Self {
            id: uuid::Uuid::new_v4(),
            egress: Mutex::new(Some(egress_tx)),
            closing: close_tx,
            room: RwLock::new(None),
        });

        let handles = ConnectionHandles {
            egress: egress_rx,
            closed: close_rx,
        };

        (connection, handles)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn room(&self) -> Option<String> {
        self.room.read().clone()
    }

    pub fn set_room(&self, room: Option<String>) {
        *self.room.write() = room;
    }

    /// Whether this connection is in `room` (`None` matches unroomed connections).
    pub fn in_room(&self, room: Option<&str>) -> bool {
        self.room.read().as_deref() == room
    }

    /// Queue an event for the write loop.
    pub fn send(&self, event: Event) -> Result<(), EventError> {
        match self.egress.lock().as_ref() {
            Some(tx) => tx.send(event).map_err(|_| EventError::ConnectionClosed),
            None => Err(EventError::ConnectionClosed),
        }
    }

    /// Close the outbound queue and stop the read loop.
    ///
    /// Events already queued are still written, followed by a close frame,
    /// as long as the socket accepts them within the close grace period.
    /// Returns `true` only for the call that actually closed the connection.
    pub fn close(&self) -> bool {
        let egress = self.egress.lock().take();
        self.closing.send_replace(true);
        egress.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.egress.lock().is_none()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

// ─────────────────────────────────────────────────────────────────────────────
// Accept
// ─────────────────────────────────────────────────────────────────────────────

/// Register an upgraded socket with `hub` and start its loops.
///
/// The connection is registered before either loop starts, so a loop that
/// exits immediately still finds it in the hub to remove.
pub fn accept_connection<H: ConnectionHub>(
    socket: WebSocket,
    hub: Arc<H>,
    config: ConnectionConfig,
) -> Arc<Connection> {
    let (sink, stream) = socket.split();
    let (connection, handles) = Connection::new();

    hub.add_connection(connection.clone());
    info!(
        connection = %connection.id(),
        "Client connected (total: {})",
        hub.connection_count()
    );

    spawn_loops(connection.clone(), handles, stream, sink, hub, config);
    connection
}

/// Spawn the read and write loops for an already registered connection.
pub fn spawn_loops<H, S, E, K>(
    connection: Arc<Connection>,
    handles: ConnectionHandles,
    stream: S,
    sink: K,
    hub: Arc<H>,
    config: ConnectionConfig,
) where
    H: ConnectionHub,
    S: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
    K: Sink<Message> + Unpin + Send + 'static,
    K::Error: Display + Send,
{
    tokio::spawn(read_loop(
        connection.clone(),
        stream,
        handles.closed.clone(),
        hub.clone(),
        config,
    ));
    tokio::spawn(write_loop(
        connection,
        sink,
        handles.egress,
        handles.closed,
        hub,
        config,
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Read loop
// ─────────────────────────────────────────────────────────────────────────────

/// Read frames until the peer goes away, the pong deadline passes, a frame
/// is oversized or fails to decode, or the connection is closed from outside.
///
/// The upgrade already caps message size for real sockets; the check here
/// covers any other stream handed to [`spawn_loops`].
pub async fn read_loop<H, S, E>(
    connection: Arc<Connection>,
    mut stream: S,
    mut closed: watch::Receiver<bool>,
    hub: Arc<H>,
    config: ConnectionConfig,
) where
    H: ConnectionHub,
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let id = connection.id();
    let mut deadline = Instant::now() + config.heartbeat_timeout;

    loop {
        let next = tokio::select! {
            _ = wait_closed(&mut closed) => {
                debug!(connection = %id, "Read loop stopped: connection closed");
                break;
            }
            next = tokio::time::timeout_at(deadline, stream.next()) => next,
        };

        let message = match next {
            Err(_) => {
                warn!(
                    connection = %id,
                    "No pong within {:?}, dropping connection",
                    config.heartbeat_timeout
                );
                break;
            }
            Ok(None) => {
                debug!(connection = %id, "Stream ended");
                break;
            }
            Ok(Some(Err(e))) => {
                warn!(connection = %id, "Error reading message: {e}");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        let frame = match &message {
            Message::Text(text) => text.as_str().as_bytes(),
            Message::Binary(data) => &data[..],
            Message::Pong(_) => {
                debug!(connection = %id, "pong");
                deadline = Instant::now() + config.heartbeat_timeout;
                continue;
            }
            // Answered by the protocol layer.
            Message::Ping(_) => continue,
            Message::Close(frame) => {
                log_close(&connection, frame.as_ref());
                break;
            }
        };

        if frame.len() > config.max_frame_bytes {
            warn!(
                connection = %id,
                "Frame of {} bytes exceeds limit of {}",
                frame.len(),
                config.max_frame_bytes
            );
            break;
        }

        let handled = match Event::decode(frame) {
            Ok(event) => {
                let event_type = event.event_type.clone();
                hub.route_event(event, &connection)
                    .await
                    .map_err(|e| (Some(event_type), e))
            }
            Err(e) => Err((None, e)),
        };

        if let Err((event_type, e)) = handled {
            let event_type = event_type.as_deref().unwrap_or("-");
            if e.is_fatal() {
                warn!(connection = %id, event = event_type, "Dropping connection: {e}");
                break;
            }
            warn!(connection = %id, event = event_type, "Error handling event: {e}");
        }
    }

    hub.remove_connection(&connection);
}

fn log_close(connection: &Connection, frame: Option<&CloseFrame>) {
    match frame {
        Some(frame) if frame.code != close_code::NORMAL && frame.code != close_code::AWAY => {
            warn!(
                connection = %connection.id(),
                code = frame.code,
                "Unexpected close: {}",
                frame.reason.as_str()
            );
        }
        _ => debug!(connection = %connection.id(), "Client closed connection"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Write loop
// ─────────────────────────────────────────────────────────────────────────────

/// Drain the outbound queue onto the socket and ping on every heartbeat tick.
pub async fn write_loop<H, K>(
    connection: Arc<Connection>,
    mut sink: K,
    mut egress: mpsc::UnboundedReceiver<Event>,
    mut closed: watch::Receiver<bool>,
    hub: Arc<H>,
    config: ConnectionConfig,
) where
    H: ConnectionHub,
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let id = connection.id();
    let mut ticker = tokio::time::interval_at(
        Instant::now() + config.heartbeat_interval,
        config.heartbeat_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = egress.recv() => {
                let Some(event) = event else {
                    // Queue closed by the registry: say goodbye.
                    let goodbye = Message::Close(None);
                    if let Err(e) = send_frame(&mut sink, goodbye, &mut closed, config.close_grace).await {
                        debug!(connection = %id, "Close frame not delivered: {e}");
                    }
                    break;
                };

                let text = match event.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        error!(connection = %id, "Failed to encode {}: {e}", event.event_type);
                        break;
                    }
                };

                let frame = Message::Text(text.into());
                if let Err(e) = send_frame(&mut sink, frame, &mut closed, config.close_grace).await {
                    warn!(connection = %id, "Failed to write message: {e}");
                    break;
                }
                debug!(connection = %id, event = %event.event_type, "sent message");
            }

            _ = ticker.tick() => {
                debug!(connection = %id, "ping");
                let ping = Message::Ping(Bytes::new());
                if let Err(e) = send_frame(&mut sink, ping, &mut closed, config.close_grace).await {
                    debug!(connection = %id, "Ping failed: {e}");
                    break;
                }
            }
        }
    }

    drop(ticker);
    drop(sink);
    hub.remove_connection(&connection);
}

/// Resolves once the connection has been closed.
async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    // Only fails if the connection itself is gone, which also means closed.
    let _ = closed.wait_for(|closed| *closed).await;
}

/// Why a frame did not reach the socket.
enum SendError<E> {
    Sink(E),
    Abandoned(Duration),
}

impl<E: Display> Display for SendError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sink(e) => write!(f, "{e}"),
            Self::Abandoned(grace) => write!(f, "still pending {grace:?} after close"),
        }
    }
}

/// Write one frame. A send that is still pending once the connection has
/// been closed for `grace` is abandoned, so a peer that stopped reading
/// cannot hold the socket open.
async fn send_frame<K>(
    sink: &mut K,
    message: Message,
    closed: &mut watch::Receiver<bool>,
    grace: Duration,
) -> Result<(), SendError<K::Error>>
where
    K: Sink<Message> + Unpin,
{
    let expired = async {
        wait_closed(closed).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        biased;
        sent = sink.send(message) => sent.map_err(SendError::Sink),
        _ = expired => Err(SendError::Abandoned(grace)),
    }
}
