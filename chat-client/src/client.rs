//! ChatClient - the main interface for Tandem.
//!
//! This module provides [`ChatClient`], which owns the session, the
//! contact directory, the conversation for the active peer, the composer,
//! and the realtime channel, and keeps them consistent while requests are
//! in flight.
//!
//! # Architecture
//!
//! ```text
//! Application → ChatClient → ChatApi   → request/response backend
//!                   │      → RealtimeChannel → Transport → realtime backend
//!                   ↓
//!              chat-core (pure state)
//! ```
//!
//! State lives behind short, synchronous critical sections; no lock is
//! held across an `.await`. Every result that arrives after a suspension
//! point is checked against the state at resolution time:
//!
//! - a history response is applied only if its peer is still active
//! - nothing is applied after the session it was issued under ended
//!
//! Sessions are told apart by their generation, not their token, so a
//! result from before a logout is dropped even if the next login gets
//! the same token back. Superseded requests are never cancelled; their
//! results are dropped.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tandem_chat_core::composer::is_blank;
use tandem_chat_core::{
    ChannelState, Composer, ContactDirectory, ConversationStore, HistoryOutcome, HistoryRequest,
    NoSession, RemoteAppend, SessionContext,
};
use tandem_chat_types::{Identity, InboundMessage, Message, Peer, SessionToken, UserId};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::api::{ApiError, ChatApi, HttpApi};
use crate::channel::{ChannelError, RealtimeChannel};
use crate::events::{ClientEvent, EventSink, Operation};
use crate::lock;
use crate::transport::{Transport, WebSocketTransport};

/// Default request/response backend.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
/// Default realtime backend.
pub const DEFAULT_REALTIME_URL: &str = "ws://localhost:5000/ws";
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request/response backend error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Realtime channel error.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The operation needs a logged-in session.
    #[error(transparent)]
    NoSession(#[from] NoSession),

    /// The peer is not among the current search results.
    #[error("unknown peer: {0}")]
    UnknownPeer(UserId),

    /// The operation needs a selected peer.
    #[error("no peer selected")]
    NoActivePeer,

    /// The realtime channel is not connected.
    #[error("not connected")]
    NotConnected,

    /// The session ended before the operation could complete.
    #[error("session ended while the request was in flight")]
    Superseded,
}

impl ClientError {
    /// Whether logging in again may fix this.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(ApiError::Unauthorized) | Self::NoSession(_))
    }
}

/// Why a send was refused locally, without any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Content is empty or whitespace.
    EmptyContent,
    /// No peer is selected.
    NoActivePeer,
    /// The receiver is not the selected peer.
    NotActivePeer,
}

/// Result of a send that did not fail on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Persisted; carries the canonical server copy.
    Sent(Message),
    /// Refused locally; nothing was called or changed.
    Rejected(RejectReason),
}

/// The session an operation was issued under.
#[derive(Debug, Clone)]
struct Ticket {
    token: SessionToken,
    generation: u64,
}

/// Configuration for ChatClient.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the request/response backend.
    pub api_url: String,
    /// URL of the realtime backend.
    pub realtime_url: String,
    /// Timeout for each request/response call.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Set the request/response backend URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the realtime backend URL.
    pub fn with_realtime_url(mut self, url: impl Into<String>) -> Self {
        self.realtime_url = url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// The main chat client.
///
/// Generic over the request/response backend and the realtime transport
/// so tests can substitute [`MockApi`](crate::MockApi) and
/// [`MockTransport`](crate::MockTransport).
pub struct ChatClient<A: ChatApi, T: Transport> {
    config: ClientConfig,
    api: A,
    channel: RealtimeChannel<T>,
    session: Mutex<SessionContext>,
    contacts: Mutex<ContactDirectory>,
    /// Shared with the inbound handler.
    conversation: Arc<Mutex<ConversationStore>>,
    composer: Mutex<Composer>,
    events: EventSink,
}

impl ChatClient<HttpApi, WebSocketTransport> {
    /// Create a client for the HTTP backend and websocket realtime channel.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let api = HttpApi::new(&config.api_url, config.request_timeout)?;
        Ok(Self::new(config, api, WebSocketTransport::new()))
    }
}

impl<A: ChatApi, T: Transport> ChatClient<A, T> {
    /// Create a client. Nothing is connected until a session starts.
    pub fn new(config: ClientConfig, api: A, transport: T) -> Self {
        let events = EventSink::new();
        let conversation = Arc::new(Mutex::new(ConversationStore::new()));
        let channel =
            RealtimeChannel::with_events(config.realtime_url.clone(), transport, events.clone());

        let store = conversation.clone();
        let sink = events.clone();
        channel.on_inbound(move |inbound| apply_inbound(&store, &sink, inbound));

        Self {
            config,
            api,
            channel,
            session: Mutex::new(SessionContext::new()),
            contacts: Mutex::new(ContactDirectory::new()),
            conversation,
            composer: Mutex::new(Composer::new()),
            events,
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ===========================================
    // Session
    // ===========================================

    /// Create an account. Does not start a session.
    pub async fn signup(&self, username: &str, password: &str) -> Result<(), ClientError> {
        self.api.signup(username, password).await.map_err(|e| {
            self.events.notice(Operation::Signup, &e);
            e
        })?;
        tracing::info!("account created for {}", username);
        Ok(())
    }

    /// Log in and bootstrap the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, ClientError> {
        let response = self.api.login(username, password).await.map_err(|e| {
            self.events.notice(Operation::Login, &e);
            e
        })?;
        self.resume(response.token).await
    }

    /// Bootstrap a session from a token (after login, or a restored one).
    ///
    /// Fetches the profile, establishes the identity, loads the contact
    /// set, then connects and registers the realtime channel. A channel
    /// failure is reported as a notice and does not undo the session.
    ///
    /// A logout while this is in flight wins: the profile is dropped and
    /// this returns [`ClientError::Superseded`].
    pub async fn resume(&self, token: SessionToken) -> Result<Identity, ClientError> {
        if lock(&self.session).is_established() {
            self.logout().await;
        }
        let generation = lock(&self.session).generation();

        let profile = self.api.current_user(&token).await.map_err(|e| {
            self.events.notice(Operation::Resume, &e);
            e
        })?;

        let identity = Identity::new(profile.id, profile.display_name, token);
        let ticket = {
            let mut session = lock(&self.session);
            if session.generation() != generation {
                tracing::debug!("session ended during bootstrap; profile for {} dropped", identity.id);
                return Err(ClientError::Superseded);
            }
            session.establish(identity.clone());
            lock(&self.contacts).load(profile.contacts);
            Ticket {
                token: identity.token.clone(),
                generation: session.generation(),
            }
        };
        tracing::info!("session established for {}", identity.id);

        match self.channel.connect(identity.id.clone()).await {
            Ok(()) => {}
            Err(ChannelError::Superseded) => tracing::debug!("channel released while connecting"),
            Err(e) => self.events.notice(Operation::Connect, &e),
        }

        let still_current = self.current_session(&ticket).is_some();
        if !still_current {
            // Logged out while connecting; release what the connect left behind
            let established = lock(&self.session).is_established();
            if !established {
                if let Err(e) = self.channel.disconnect().await {
                    tracing::debug!("disconnect after superseded bootstrap: {}", e);
                }
            }
            return Err(ClientError::Superseded);
        }

        Ok(identity)
    }

    /// End the session: release the channel registration and clear every
    /// piece of session state.
    pub async fn logout(&self) {
        if let Err(e) = self.channel.disconnect().await {
            tracing::debug!("disconnect during logout: {}", e);
        }

        let ended = lock(&self.session).teardown();
        lock(&self.contacts).reset();
        lock(&self.conversation).clear();
        lock(&self.composer).clear();

        if let Some(identity) = ended {
            tracing::info!("session ended for {}", identity.id);
        }
        self.events.emit(ClientEvent::SessionEnded);
    }

    /// The logged-in identity, if any.
    pub fn identity(&self) -> Option<Identity> {
        lock(&self.session).current().cloned()
    }

    // ===========================================
    // Contacts
    // ===========================================

    /// Snapshot of the contact set.
    pub fn contacts(&self) -> Vec<Peer> {
        lock(&self.contacts).contacts().to_vec()
    }

    /// Snapshot of the latest search results.
    pub fn search_results(&self) -> Vec<Peer> {
        lock(&self.contacts).search_results().to_vec()
    }

    /// Search users by name.
    ///
    /// A blank query is a no-op that returns the current results.
    pub async fn search(&self, query: &str) -> Result<Vec<Peer>, ClientError> {
        let ticket = self.ticket()?;
        let query = {
            let mut contacts = lock(&self.contacts);
            match contacts.begin_search(query) {
                Some(query) => query.to_string(),
                None => return Ok(contacts.search_results().to_vec()),
            }
        };

        let results = self.api.search_users(&ticket.token, &query).await.map_err(|e| {
            self.events.notice(Operation::Search, &e);
            e
        })?;

        if let Some(_session) = self.current_session(&ticket) {
            lock(&self.contacts).set_search_results(results.clone());
            self.events.emit(ClientEvent::SearchCompleted {
                count: results.len(),
            });
        }
        Ok(results)
    }

    /// Save `peer` as a contact.
    ///
    /// Returns whether the contact set grew; a peer already present is
    /// never added twice.
    pub async fn add_contact(&self, peer: Peer) -> Result<bool, ClientError> {
        let ticket = self.ticket()?;
        self.api.add_contact(&ticket.token, &peer.id).await.map_err(|e| {
            self.events.notice(Operation::AddContact, &e);
            e
        })?;

        let Some(_session) = self.current_session(&ticket) else {
            tracing::debug!("session ended before contact {} was saved", peer.id);
            return Ok(false);
        };
        let added = lock(&self.contacts).merge(peer.clone());
        if added {
            tracing::debug!("contact added: {}", peer.id);
            self.events.emit(ClientEvent::ContactAdded(peer));
        }
        Ok(added)
    }

    // ===========================================
    // Conversation
    // ===========================================

    /// Make `peer` the active peer and load its history.
    ///
    /// The transcript is emptied immediately. If another peer is selected
    /// before the history arrives, the late response is dropped and this
    /// returns [`HistoryOutcome::Stale`].
    pub async fn select_peer(&self, peer: Peer) -> Result<HistoryOutcome, ClientError> {
        let ticket = self.ticket()?;
        let request = lock(&self.conversation).select_peer(peer);
        self.fetch_history(&ticket, request).await
    }

    /// Reload the active peer's history.
    pub async fn load_history(&self) -> Result<HistoryOutcome, ClientError> {
        let ticket = self.ticket()?;
        let Some(request) = lock(&self.conversation).reload() else {
            return Err(ClientError::NoActivePeer);
        };
        self.fetch_history(&ticket, request).await
    }

    /// Select one of the current search results.
    ///
    /// Clears the results, makes the peer active and loads its history.
    /// The peer is added as a contact only if not already one; a failed
    /// add is reported as a notice and does not undo the selection.
    pub async fn select_search_result(&self, peer_id: &UserId) -> Result<HistoryOutcome, ClientError> {
        let ticket = self.ticket()?;
        let (peer, known) = {
            let mut contacts = lock(&self.contacts);
            let peer = contacts
                .take_search_result(peer_id)
                .ok_or_else(|| ClientError::UnknownPeer(peer_id.clone()))?;
            let known = contacts.contains(&peer.id);
            (peer, known)
        };

        let request = lock(&self.conversation).select_peer(peer.clone());
        if known {
            return self.fetch_history(&ticket, request).await;
        }

        let (history, added) = tokio::join!(self.fetch_history(&ticket, request), self.add_contact(peer));
        if let Err(e) = added {
            tracing::debug!("add contact on selection failed: {}", e);
        }
        history
    }

    /// Snapshot of the active transcript, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.conversation).messages().to_vec()
    }

    /// The active peer, if any.
    pub fn active_peer(&self) -> Option<Peer> {
        lock(&self.conversation).active_peer().cloned()
    }

    // ===========================================
    // Sending
    // ===========================================

    /// Persist a message to `receiver_id`, append the canonical copy to
    /// the transcript, then publish it on the realtime channel.
    ///
    /// Blank content, no active peer, or a receiver other than the active
    /// peer are refused locally without any call. On a network failure
    /// nothing is appended or published.
    pub async fn send(&self, receiver_id: &UserId, content: &str) -> Result<SendOutcome, ClientError> {
        if is_blank(content) {
            return Ok(SendOutcome::Rejected(RejectReason::EmptyContent));
        }
        let (identity, ticket) = {
            let session = lock(&self.session);
            let identity = session.require()?.clone();
            let ticket = Ticket {
                token: identity.token.clone(),
                generation: session.generation(),
            };
            (identity, ticket)
        };
        match lock(&self.conversation).active_peer() {
            None => return Ok(SendOutcome::Rejected(RejectReason::NoActivePeer)),
            Some(peer) if &peer.id != receiver_id => {
                return Ok(SendOutcome::Rejected(RejectReason::NotActivePeer))
            }
            Some(_) => {}
        }

        let message = self
            .api
            .send_message(&ticket.token, receiver_id, content)
            .await
            .map_err(|e| {
                self.events.notice(Operation::SendMessage, &e);
                e
            })?;

        let appended = {
            let Some(_session) = self.current_session(&ticket) else {
                return Ok(SendOutcome::Sent(message));
            };
            let mut conversation = lock(&self.conversation);
            if conversation.is_active(receiver_id) {
                conversation.append_local(message.clone());
                true
            } else {
                false
            }
        };
        if appended {
            self.events.emit(ClientEvent::MessageAppended {
                peer_id: receiver_id.clone(),
                message: message.clone(),
            });
        } else {
            tracing::debug!("active peer changed during send; transcript left as is");
        }

        // Best effort: the message is already persisted
        if let Err(e) = self
            .channel
            .publish(
                identity.id.clone(),
                identity.display_name.clone(),
                receiver_id.clone(),
                message.content.clone(),
            )
            .await
        {
            self.events.notice(Operation::Publish, &e);
        }

        Ok(SendOutcome::Sent(message))
    }

    /// Replace the composer draft.
    pub fn set_draft(&self, text: impl Into<String>) {
        lock(&self.composer).set(text);
    }

    /// Current composer draft.
    pub fn draft(&self) -> String {
        lock(&self.composer).draft().to_string()
    }

    /// Send the draft to the active peer; clear it only on success.
    pub async fn send_draft(&self) -> Result<SendOutcome, ClientError> {
        let Some(text) = lock(&self.composer).sendable().map(str::to_string) else {
            return Ok(SendOutcome::Rejected(RejectReason::EmptyContent));
        };
        let Some(peer) = self.active_peer() else {
            return Ok(SendOutcome::Rejected(RejectReason::NoActivePeer));
        };

        let outcome = self.send(&peer.id, &text).await?;
        if matches!(outcome, SendOutcome::Sent(_)) {
            let mut composer = lock(&self.composer);
            // Keep anything typed while the send was in flight
            if composer.draft() == text {
                composer.clear();
            }
        }
        Ok(outcome)
    }

    // ===========================================
    // Realtime
    // ===========================================

    /// Apply inbound messages until the realtime connection closes.
    pub async fn run_inbound(&self) -> Result<(), ClientError> {
        if !self.channel.state().is_live() {
            return Err(ClientError::NotConnected);
        }
        self.channel.run_inbound().await?;
        Ok(())
    }

    /// Realtime channel lifecycle state.
    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Subscribe to client notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Get a reference to the backend (for testing).
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Get a reference to the transport (for testing).
    pub fn transport(&self) -> &T {
        self.channel.transport()
    }

    // ===========================================
    // Internals
    // ===========================================

    fn ticket(&self) -> Result<Ticket, ClientError> {
        let session = lock(&self.session);
        Ok(Ticket {
            token: session.require()?.token.clone(),
            generation: session.generation(),
        })
    }

    /// The session lock, if the session `ticket` was issued under is still
    /// current. Logout tears the session down before clearing anything
    /// else, so state changed while this is held is never left behind.
    fn current_session(&self, ticket: &Ticket) -> Option<MutexGuard<'_, SessionContext>> {
        let session = lock(&self.session);
        session.is_current(ticket.generation).then_some(session)
    }

    async fn fetch_history(&self, ticket: &Ticket, request: HistoryRequest) -> Result<HistoryOutcome, ClientError> {
        let peer_id = request.peer_id().clone();
        let result = self.api.get_messages(&ticket.token, &peer_id).await;

        let Some(session) = self.current_session(ticket) else {
            return Ok(HistoryOutcome::Stale);
        };

        match result {
            Ok(history) => {
                let outcome = lock(&self.conversation).apply_history(&request, history);
                drop(session);
                match outcome {
                    HistoryOutcome::Applied { count } => {
                        tracing::debug!("history for {} applied ({} messages)", peer_id, count);
                        self.events.emit(ClientEvent::HistoryLoaded { peer_id, count });
                    }
                    HistoryOutcome::Stale => {
                        tracing::debug!("late history for {} discarded", peer_id);
                        self.events.emit(ClientEvent::HistoryDiscarded { peer_id });
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                drop(session);
                if lock(&self.conversation).is_active(&peer_id) {
                    self.events.notice(Operation::LoadHistory, &e);
                    Err(e.into())
                } else {
                    tracing::debug!("history load for superseded peer {} failed: {}", peer_id, e);
                    Ok(HistoryOutcome::Stale)
                }
            }
        }
    }
}

/// Inbound bridge: reads the active peer at the moment each event arrives.
fn apply_inbound(store: &Mutex<ConversationStore>, events: &EventSink, inbound: InboundMessage) {
    let message = inbound.to_message();
    let origin = inbound.sender_id;

    let outcome = lock(store).append_remote(message.clone(), &origin);
    match outcome {
        RemoteAppend::Appended => events.emit(ClientEvent::MessageAppended {
            peer_id: origin,
            message,
        }),
        RemoteAppend::Discarded => {
            tracing::debug!("inbound message from non-active peer {} discarded", origin);
            events.emit(ClientEvent::InboundDiscarded { sender_id: origin });
        }
    }
}
