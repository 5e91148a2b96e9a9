//! Frame transport underneath the realtime channel.
//!
//! A [`Transport`] moves opaque JSON frames; it knows nothing about
//! registration or messages. [`WebSocketTransport`] is the production
//! implementation and [`MockTransport`] scripts frames for tests.
//!
//! `send()` and `recv()` may run concurrently: the inbound pump sits in
//! `recv()` for the whole session while publishes go out via `send()`.

mod mock;
mod websocket;

pub use mock::MockTransport;
pub use websocket::{WebSocketTransport, WebSocketTransportConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Maximum realtime frame size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Failures of the frame transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The backend could not be reached or refused the upgrade.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No connection is open.
    #[error("not connected")]
    NotConnected,

    /// The backend hung up or `close()` was called.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame could not be written.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A frame could not be read.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connect or send took longer than configured.
    #[error("timed out")]
    Timeout,
}

/// One connection to the realtime backend, carrying whole frames.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the realtime backend at the given address.
    ///
    /// For websockets this is a `ws://` or `wss://` URL. For testing, it's arbitrary.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send one frame over the connection.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next frame.
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the backend hangs
    /// up or `close()` is called from another task.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Whether a connection is open.
    fn is_connected(&self) -> bool;

    /// Close the connection. Closing twice is not an error.
    async fn close(&self) -> Result<(), TransportError>;
}
