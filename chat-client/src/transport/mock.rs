//! In-memory stand-in for the realtime backend connection.
//!
//! Tests script what the backend pushes (`queue_event`) and inspect what
//! the client published (`sent_events`).

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tandem_chat_types::ChannelEvent;

use crate::gate::Gate;
use crate::lock;

/// Scriptable [`Transport`] with no network.
///
/// Clones share state, so a test can keep one handle while the client
/// owns another.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    connect_count: usize,
    sent_frames: Vec<Vec<u8>>,
    receive_queue: VecDeque<Vec<u8>>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
    connect_gate: Option<Gate>,
}

impl MockTransport {
    /// Create a disconnected transport with an empty inbound queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw frame to be returned by a later `recv()` call.
    pub fn queue_frame(&self, data: Vec<u8>) {
        lock(&self.inner).receive_queue.push_back(data);
    }

    /// Queue an event to be returned by a later `recv()` call.
    pub fn queue_event(&self, event: &ChannelEvent) {
        let frame = serde_json::to_vec(event).unwrap_or_default();
        self.queue_frame(frame);
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        lock(&self.inner).sent_frames.clone()
    }

    /// Get all sent frames decoded as events (undecodable frames are skipped).
    pub fn sent_events(&self) -> Vec<ChannelEvent> {
        self.sent_frames()
            .iter()
            .filter_map(|f| ChannelEvent::from_bytes(f).ok())
            .collect()
    }

    /// Address passed to the last successful `connect()`.
    pub fn connected_address(&self) -> Option<String> {
        lock(&self.inner).connected_address.clone()
    }

    /// Number of successful `connect()` calls.
    pub fn connect_count(&self) -> usize {
        lock(&self.inner).connect_count
    }

    /// Make the next `connect()` fail.
    pub fn fail_next_connect(&self, error: &str) {
        lock(&self.inner).fail_next_connect = Some(error.to_string());
    }

    /// Make the next `send()` fail.
    pub fn fail_next_send(&self, error: &str) {
        lock(&self.inner).fail_next_send = Some(error.to_string());
    }

    /// Make the next `recv()` fail.
    pub fn fail_next_recv(&self, error: &str) {
        lock(&self.inner).fail_next_recv = Some(error.to_string());
    }

    /// Hold the next `connect()` until the gate is released.
    pub fn hold_connect(&self) -> Gate {
        let gate = Gate::new();
        lock(&self.inner).connect_gate = Some(gate.clone());
        gate
    }

    /// Clear all state (frames, queue, connection).
    pub fn reset(&self) {
        *lock(&self.inner) = MockTransportInner::default();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let gate = lock(&self.inner).connect_gate.take();
        if let Some(gate) = gate {
            gate.passed().await;
        }

        let mut inner = lock(&self.inner);

        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        inner.connect_count += 1;
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_frames.push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut inner = lock(&self.inner);

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(error) = inner.fail_next_recv.take() {
            return Err(TransportError::ReceiveFailed(error));
        }

        // An empty queue behaves like the peer hanging up
        inner
            .receive_queue
            .pop_front()
            .ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        lock(&self.inner).connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        lock(&self.inner).connected = false;
        Ok(())
    }
}
