//! WebSocketTransport - realtime channel over a websocket.
//!
//! Each frame is one text message carrying a JSON event. The socket is
//! split into sink and stream halves behind separate locks so the inbound
//! pump can wait in `recv()` while publishes go out through `send()`.
//! `close()` flips the `connected` watch, which wakes a pending `recv()`
//! so it releases the stream half.

use super::{Transport, TransportError, MAX_FRAME_SIZE};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for WebSocketTransport.
#[derive(Clone, Debug)]
pub struct WebSocketTransportConfig {
    /// Connection (TCP + TLS + upgrade) timeout.
    pub connect_timeout: Duration,
    /// Send operation timeout.
    pub send_timeout: Duration,
}

impl Default for WebSocketTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(10),
        }
    }
}

/// WebSocketTransport implements the Transport trait over tokio-tungstenite.
///
/// # Example
///
/// ```ignore
/// let transport = WebSocketTransport::new();
/// transport.connect("ws://localhost:5000/ws").await?;
/// transport.send(br#"{"event":"register","data":"u1"}"#).await?;
/// let frame = transport.recv().await?;
/// ```
pub struct WebSocketTransport {
    /// Outbound half (if connected).
    sink: Mutex<Option<SplitSink<Socket, Frame>>>,
    /// Inbound half (if connected).
    stream: Mutex<Option<SplitStream<Socket>>>,
    /// Liveness flag; receivers wait for it to drop to `false`.
    connected: watch::Sender<bool>,
    config: WebSocketTransportConfig,
}

impl WebSocketTransport {
    /// Create a disconnected transport with default timeouts.
    pub fn new() -> Self {
        Self::with_config(WebSocketTransportConfig::default())
    }

    /// Create a disconnected transport with custom configuration.
    pub fn with_config(config: WebSocketTransportConfig) -> Self {
        Self {
            sink: Mutex::new(None),
            stream: Mutex::new(None),
            connected: watch::Sender::new(false),
            config,
        }
    }

    fn mark_closed(&self) {
        self.connected.send_replace(false);
    }
}

/// Resolve once the liveness flag reads `false`.
async fn wait_closed(connected: &mut watch::Receiver<bool>) {
    loop {
        let up = *connected.borrow_and_update();
        if !up || connected.changed().await.is_err() {
            return;
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        // Close existing connection if any
        self.close().await.ok();

        let (socket, _response) = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(address),
        )
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(|e| TransportError::ConnectionFailed(format!("websocket connect failed: {e}")))?;

        let (sink, stream) = socket.split();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        self.connected.send_replace(true);

        tracing::debug!("websocket connected to {}", address);
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > MAX_FRAME_SIZE {
            return Err(TransportError::SendFailed(format!(
                "frame too large: {} > {}",
                data.len(),
                MAX_FRAME_SIZE
            )));
        }
        let text = std::str::from_utf8(data)
            .map_err(|e| TransportError::SendFailed(format!("frame is not UTF-8: {e}")))?;

        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;

        tokio::time::timeout(self.config.send_timeout, sink.send(Frame::text(text.to_owned())))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| {
                self.mark_closed();
                TransportError::SendFailed(e.to_string())
            })
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut connected = self.connected.subscribe();
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;

        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = wait_closed(&mut connected) => return Err(TransportError::ConnectionClosed),
            };
            match next {
                Some(Ok(Frame::Text(text))) => return Ok(text.as_str().as_bytes().to_vec()),
                Some(Ok(Frame::Binary(bytes))) => {
                    if bytes.len() > MAX_FRAME_SIZE {
                        return Err(TransportError::ReceiveFailed(format!(
                            "frame too large: {} > {}",
                            bytes.len(),
                            MAX_FRAME_SIZE
                        )));
                    }
                    return Ok(bytes.to_vec());
                }
                // tungstenite answers pings itself
                Some(Ok(Frame::Ping(_) | Frame::Pong(_) | Frame::Frame(_))) => continue,
                Some(Ok(Frame::Close(_))) | None => {
                    self.mark_closed();
                    return Err(TransportError::ConnectionClosed);
                }
                Some(Err(e)) => {
                    self.mark_closed();
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.mark_closed();
        if let Some(mut sink) = self.sink.lock().await.take() {
            // Best effort close handshake; the peer may already be gone
            if let Err(e) = sink.close().await {
                tracing::debug!("websocket close: {}", e);
            }
        }
        // Dropping the stream half ends any pending recv on the next poll
        self.stream.lock().await.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn default_config_timeouts() {
        let config = WebSocketTransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.send_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn operations_before_connect_fail() {
        let transport = WebSocketTransport::new();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send(b"{}").await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::NotConnected)
        ));
        // Closing a never-connected transport is fine
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_before_io() {
        let transport = WebSocketTransport::new();
        let big = vec![b'a'; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            transport.send(&big).await,
            Err(TransportError::SendFailed(_))
        ));
    }

    #[tokio::test]
    async fn connect_to_unreachable_address_fails() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WebSocketTransport::new();
        let result = transport.connect(&format!("ws://{addr}")).await;
        assert!(result.is_err());
        assert!(!transport.is_connected());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn echoes_through_local_server_then_sees_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            if let Some(Ok(frame)) = ws.next().await {
                ws.send(frame).await.unwrap();
            }
            ws.close(None).await.ok();
        });

        let transport = WebSocketTransport::new();
        transport.connect(&format!("ws://{addr}")).await.unwrap();
        assert!(transport.is_connected());

        let frame = br#"{"event":"register","data":"u1"}"#;
        transport.send(frame).await.unwrap();
        assert_eq!(transport.recv().await.unwrap(), frame.to_vec());

        assert!(matches!(
            transport.recv().await,
            Err(TransportError::ConnectionClosed)
        ));
        assert!(!transport.is_connected());

        server.await.unwrap();
    }
}
