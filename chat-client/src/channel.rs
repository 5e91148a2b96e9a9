//! RealtimeChannel - one registered connection to the realtime backend.
//!
//! The lifecycle lives in chat-core's pure [`ChannelState`]; this type
//! feeds it events and executes the returned actions against a
//! [`Transport`].
//!
//! ```text
//! ChatClient → RealtimeChannel → Transport → Network
//!                   ↓
//!              chat-core (ChannelState)
//! ```
//!
//! Inbound `receiveMessage` events are handed to a single registered
//! handler. The handler is looked up per event, so replacing it takes
//! effect for the next frame.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tandem_chat_core::{Action, ChannelState, Event};
use tandem_chat_types::{ChannelEvent, InboundMessage, OutboundMessage, UserId, WireError};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::events::{ClientEvent, EventSink};
use crate::lock;
use crate::transport::{Transport, TransportError};

/// Callback invoked for every inbound message.
pub type InboundHandler = Arc<dyn Fn(InboundMessage) + Send + Sync>;

/// Realtime channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame encode/decode error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Operation needs a registered connection.
    #[error("channel not registered")]
    NotRegistered,

    /// A disconnect was requested while the connection was being opened.
    #[error("connect superseded by disconnect")]
    Superseded,
}

/// A realtime connection registered to one identity.
pub struct RealtimeChannel<T: Transport> {
    address: String,
    transport: T,
    state: Mutex<ChannelState>,
    handler: Mutex<Option<InboundHandler>>,
    events: EventSink,
}

impl<T: Transport> RealtimeChannel<T> {
    /// Create a disconnected channel for the backend at `address`.
    pub fn new(address: impl Into<String>, transport: T) -> Self {
        Self::with_events(address, transport, EventSink::new())
    }

    pub(crate) fn with_events(address: impl Into<String>, transport: T, events: EventSink) -> Self {
        Self {
            address: address.into(),
            transport,
            state: Mutex::new(ChannelState::new()),
            handler: Mutex::new(None),
            events,
        }
    }

    /// Open the connection and register `user_id`.
    ///
    /// Idempotent while connecting or registered.
    pub async fn connect(&self, user_id: UserId) -> Result<(), ChannelError> {
        self.drive(Event::ConnectRequested { user_id }).await
    }

    /// Re-announce the registered identity, e.g. after the transport
    /// re-established its connection.
    pub async fn register(&self) -> Result<(), ChannelError> {
        if !lock(&self.state).is_registered() {
            return Err(ChannelError::NotRegistered);
        }
        self.drive(Event::ConnectSucceeded).await
    }

    /// Broadcast an already-persisted message. No acknowledgment, no retry.
    pub async fn publish(
        &self,
        sender_id: UserId,
        sender_name: impl Into<String>,
        receiver_id: UserId,
        content: impl Into<String>,
    ) -> Result<(), ChannelError> {
        if !lock(&self.state).is_registered() {
            return Err(ChannelError::NotRegistered);
        }
        let event = ChannelEvent::SendMessage(OutboundMessage {
            sender_id,
            sender_name: sender_name.into(),
            receiver_id,
            content: content.into(),
        });
        self.send_event(&event).await?;
        tracing::debug!("published message");
        Ok(())
    }

    /// Release the connection and drop the registration.
    pub async fn disconnect(&self) -> Result<(), ChannelError> {
        self.drive(Event::DisconnectRequested).await
    }

    /// Set the single inbound handler, replacing any previous one.
    pub fn on_inbound<F>(&self, handler: F)
    where
        F: Fn(InboundMessage) + Send + Sync + 'static,
    {
        *lock(&self.handler) = Some(Arc::new(handler));
    }

    /// Deliver inbound messages until the connection closes.
    ///
    /// Events are handled one at a time in arrival order. Frames that do
    /// not decode, and events other than `receiveMessage`, are skipped.
    /// When the connection ends the channel moves to `Disconnected`.
    pub async fn run_inbound(&self) -> Result<(), ChannelError> {
        loop {
            let frame = match self.transport.recv().await {
                Ok(frame) => frame,
                Err(TransportError::ConnectionClosed | TransportError::NotConnected) => {
                    self.connection_lost("connection closed").await?;
                    return Ok(());
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.connection_lost(&reason).await?;
                    return Err(e.into());
                }
            };

            match ChannelEvent::from_bytes(&frame) {
                Ok(ChannelEvent::ReceiveMessage(message)) => {
                    // Clone out so the handler runs without the lock held
                    let handler = lock(&self.handler).clone();
                    match handler {
                        Some(handler) => handler(message),
                        None => tracing::debug!("inbound message with no handler registered"),
                    }
                }
                Ok(_) => tracing::debug!("ignoring non-inbound realtime event"),
                Err(e) => tracing::debug!("skipping undecodable frame: {}", e),
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        lock(&self.state).clone()
    }

    /// Subscribe to status changes (and any other client events on the same sink).
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Get a reference to the transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn connection_lost(&self, reason: &str) -> Result<(), ChannelError> {
        tracing::info!("realtime connection ended: {}", reason);
        self.drive(Event::ConnectionLost {
            reason: reason.to_string(),
        })
        .await
    }

    async fn send_event(&self, event: &ChannelEvent) -> Result<(), ChannelError> {
        let frame = event.to_bytes()?;
        self.transport.send(&frame).await?;
        Ok(())
    }

    /// Feed `event` to the state machine and execute the resulting actions,
    /// including any follow-up events those actions produce.
    async fn drive(&self, event: Event) -> Result<(), ChannelError> {
        let mut pending = VecDeque::from([event]);
        let mut failure: Option<ChannelError> = None;

        while let Some(event) = pending.pop_front() {
            let actions = {
                let mut state = lock(&self.state);
                let (next, actions) = state.clone().on_event(event);
                *state = next;
                actions
            };

            for action in actions {
                match action {
                    Action::Connect => match self.transport.connect(&self.address).await {
                        Ok(()) => {
                            let connecting = matches!(*lock(&self.state), ChannelState::Connecting { .. });
                            // Disconnected meanwhile; the state machine closes it again
                            if !connecting {
                                tracing::debug!("connect completed after disconnect; closing");
                                failure = Some(ChannelError::Superseded);
                            }
                            pending.push_back(Event::ConnectSucceeded);
                        }
                        Err(e) => {
                            pending.push_back(Event::ConnectFailed {
                                error: e.to_string(),
                            });
                            failure = Some(e.into());
                        }
                    },
                    Action::Register { user_id } => {
                        tracing::debug!("registering {}", user_id);
                        if let Err(e) = self.send_event(&ChannelEvent::Register(user_id)).await {
                            pending.push_back(Event::ConnectionLost {
                                reason: e.to_string(),
                            });
                            failure = Some(e);
                        }
                    }
                    Action::Close => {
                        if let Err(e) = self.transport.close().await {
                            tracing::debug!("transport close: {}", e);
                        }
                    }
                    Action::Emit(status) => {
                        tracing::debug!("channel status {:?}", status);
                        self.events.emit(ClientEvent::ChannelStateChanged(status));
                    }
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use tandem_chat_core::StatusEvent;

    const ADDRESS: &str = "ws://test/ws";

    fn channel() -> RealtimeChannel<MockTransport> {
        RealtimeChannel::new(ADDRESS, MockTransport::new())
    }

    fn inbound_frame(sender: &str, content: &str) -> ChannelEvent {
        ChannelEvent::ReceiveMessage(InboundMessage {
            sender_id: UserId::from(sender),
            sender_name: Some(sender.to_uppercase()),
            receiver_id: None,
            content: content.to_string(),
        })
    }

    // ===========================================
    // Connect / Register Tests
    // ===========================================

    #[tokio::test]
    async fn connect_registers_identity() {
        let channel = channel();
        let mut rx = channel.subscribe();

        channel.connect(UserId::from("a")).await.unwrap();

        assert!(channel.state().is_registered());
        assert_eq!(channel.transport().connected_address(), Some(ADDRESS.into()));
        assert_eq!(
            channel.transport().sent_events(),
            vec![ChannelEvent::Register(UserId::from("a"))]
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::ChannelStateChanged(StatusEvent::Registered {
                user_id: UserId::from("a")
            })
        );
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let channel = channel();
        channel.connect(UserId::from("a")).await.unwrap();
        channel.connect(UserId::from("a")).await.unwrap();

        assert_eq!(channel.transport().connect_count(), 1);
        assert_eq!(channel.transport().sent_events().len(), 1);
    }

    #[tokio::test]
    async fn connect_failure_returns_to_disconnected() {
        let channel = channel();
        let mut rx = channel.subscribe();
        channel.transport().fail_next_connect("refused");

        let result = channel.connect(UserId::from("a")).await;

        assert!(matches!(result, Err(ChannelError::Transport(_))));
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert!(matches!(
            rx.recv().await.unwrap(),
            ClientEvent::ChannelStateChanged(StatusEvent::ConnectionFailed { .. })
        ));

        // A later attempt starts over
        channel.connect(UserId::from("a")).await.unwrap();
        assert!(channel.state().is_registered());
    }

    #[tokio::test]
    async fn failed_register_send_drops_to_disconnected() {
        let channel = channel();
        channel.transport().fail_next_send("broken pipe");

        let result = channel.connect(UserId::from("a")).await;

        assert!(matches!(result, Err(ChannelError::Transport(_))));
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn register_reissues_only_when_registered() {
        let channel = channel();
        assert!(matches!(
            channel.register().await,
            Err(ChannelError::NotRegistered)
        ));

        channel.connect(UserId::from("a")).await.unwrap();
        channel.register().await.unwrap();

        assert_eq!(
            channel.transport().sent_events(),
            vec![
                ChannelEvent::Register(UserId::from("a")),
                ChannelEvent::Register(UserId::from("a")),
            ]
        );
        assert!(channel.state().is_registered());
    }

    // ===========================================
    // Publish Tests
    // ===========================================

    #[tokio::test]
    async fn publish_sends_outbound_event() {
        let channel = channel();
        channel.connect(UserId::from("a")).await.unwrap();

        channel
            .publish(UserId::from("a"), "alice", UserId::from("b"), "hi")
            .await
            .unwrap();

        let sent = channel.transport().sent_events();
        assert_eq!(
            sent.last(),
            Some(&ChannelEvent::SendMessage(OutboundMessage {
                sender_id: UserId::from("a"),
                sender_name: "alice".into(),
                receiver_id: UserId::from("b"),
                content: "hi".into(),
            }))
        );
    }

    #[tokio::test]
    async fn publish_without_registration_fails() {
        let channel = channel();
        let result = channel
            .publish(UserId::from("a"), "alice", UserId::from("b"), "hi")
            .await;
        assert!(matches!(result, Err(ChannelError::NotRegistered)));
        assert!(channel.transport().sent_frames().is_empty());
    }

    // ===========================================
    // Inbound Tests
    // ===========================================

    #[tokio::test]
    async fn run_inbound_delivers_messages_in_order() {
        let channel = channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        channel.on_inbound(move |msg| sink.lock().unwrap().push(msg.content));

        channel.connect(UserId::from("a")).await.unwrap();
        let transport = channel.transport();
        transport.queue_event(&inbound_frame("b", "one"));
        transport.queue_frame(b"garbage".to_vec());
        transport.queue_event(&ChannelEvent::Register(UserId::from("z")));
        transport.queue_event(&inbound_frame("c", "two"));

        channel.run_inbound().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn run_inbound_end_moves_to_disconnected() {
        let channel = channel();
        channel.connect(UserId::from("a")).await.unwrap();
        let mut rx = channel.subscribe();

        channel.run_inbound().await.unwrap();

        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert!(matches!(
            rx.recv().await.unwrap(),
            ClientEvent::ChannelStateChanged(StatusEvent::Disconnected { .. })
        ));
    }

    #[tokio::test]
    async fn run_inbound_receive_error_is_returned() {
        let channel = channel();
        channel.connect(UserId::from("a")).await.unwrap();
        channel.transport().fail_next_recv("reset by peer");

        let result = channel.run_inbound().await;

        assert!(matches!(
            result,
            Err(ChannelError::Transport(TransportError::ReceiveFailed(_)))
        ));
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn replacing_handler_takes_effect() {
        let channel = channel();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        channel.on_inbound(move |msg| first.lock().unwrap().push(format!("first:{}", msg.content)));
        let second = seen.clone();
        channel.on_inbound(move |msg| second.lock().unwrap().push(format!("second:{}", msg.content)));

        channel.connect(UserId::from("a")).await.unwrap();
        channel.transport().queue_event(&inbound_frame("b", "x"));
        channel.run_inbound().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["second:x"]);
    }

    // ===========================================
    // Disconnect Tests
    // ===========================================

    #[tokio::test]
    async fn disconnect_closes_transport() {
        let channel = channel();
        channel.connect(UserId::from("a")).await.unwrap();
        let mut rx = channel.subscribe();

        channel.disconnect().await.unwrap();

        assert!(!channel.transport().is_connected());
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::ChannelStateChanged(StatusEvent::Disconnected {
                reason: "user requested".into()
            })
        );
    }

    #[tokio::test]
    async fn disconnect_while_connecting_closes_late_connection() {
        let channel = channel();
        let gate = channel.transport().hold_connect();

        let (connected, disconnected) = tokio::join!(channel.connect(UserId::from("a")), async {
            tokio::task::yield_now().await;
            let result = channel.disconnect().await;
            gate.release();
            result
        });

        assert!(matches!(connected, Err(ChannelError::Superseded)));
        assert!(disconnected.is_ok());
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert!(!channel.transport().is_connected());
        assert!(channel.transport().sent_events().is_empty());
    }

    #[tokio::test]
    async fn disconnect_when_disconnected_is_noop() {
        let channel = channel();
        channel.disconnect().await.unwrap();
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }
}
