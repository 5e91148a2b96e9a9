//! Notifications from the client to the application.
//!
//! The client never returns failures of background work (history loads,
//! publishes, contact adds triggered by a selection) to a caller. They are
//! reported here as [`ClientEvent::Notice`], alongside the state changes a
//! UI needs to re-render.

use tandem_chat_core::StatusEvent;
use tandem_chat_types::{Message, Peer, UserId};
use tokio::sync::broadcast;

/// Capacity of the notification channel; slow subscribers see `Lagged`.
pub const EVENT_CAPACITY: usize = 256;

/// The network-facing operation a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Operation {
    Signup,
    Login,
    Resume,
    Search,
    AddContact,
    LoadHistory,
    SendMessage,
    Connect,
    Publish,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Signup => "signup",
            Self::Login => "login",
            Self::Resume => "resume session",
            Self::Search => "search",
            Self::AddContact => "add contact",
            Self::LoadHistory => "load history",
            Self::SendMessage => "send message",
            Self::Connect => "connect",
            Self::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Something the application may want to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A network-facing operation failed; nothing was changed.
    Notice {
        /// What was being attempted.
        operation: Operation,
        /// Human-readable failure.
        message: String,
    },
    /// The transcript was replaced with the active peer's history.
    HistoryLoaded {
        /// Peer the history belongs to.
        peer_id: UserId,
        /// Messages in the transcript.
        count: usize,
    },
    /// A history response arrived for a peer that is no longer active.
    HistoryDiscarded {
        /// Peer the late response belonged to.
        peer_id: UserId,
    },
    /// A message was appended to the active transcript.
    MessageAppended {
        /// The active peer.
        peer_id: UserId,
        /// The appended message.
        message: Message,
    },
    /// An inbound message from a non-active peer was dropped.
    InboundDiscarded {
        /// Who sent it.
        sender_id: UserId,
    },
    /// A peer joined the contact set.
    ContactAdded(Peer),
    /// A search finished and replaced the search results.
    SearchCompleted {
        /// Number of results.
        count: usize,
    },
    /// The realtime channel changed state.
    ChannelStateChanged(StatusEvent),
    /// Logout finished; all session state is gone.
    SessionEnded,
}

/// Sending half of the notification channel.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventSink {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish to current subscribers. Having none is not an error.
    pub(crate) fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn notice(&self, operation: Operation, error: &impl std::fmt::Display) {
        tracing::warn!("{} failed: {}", operation, error);
        self.emit(ClientEvent::Notice {
            operation,
            message: error.to_string(),
        });
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}
