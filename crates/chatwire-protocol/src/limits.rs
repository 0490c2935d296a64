//! Connection limits shared by the transport and its clients.

use std::time::Duration;

/// Largest inbound message the server accepts, in bytes.
pub const MAX_FRAME_BYTES: usize = 1024;

/// How long the server waits for a pong before dropping the connection.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a closed connection may keep flushing queued frames before
/// its socket is dropped.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Ping interval for a given pong deadline: 90% of it, so a ping always
/// goes out before the peer's deadline can expire.
pub const fn heartbeat_interval(timeout: Duration) -> Duration {
    Duration::from_nanos((timeout.as_nanos() * 9 / 10) as u64)
}
