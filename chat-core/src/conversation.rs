//! Conversation store: the active peer and its transcript.
//!
//! The transcript in memory only ever belongs to the active peer.
//! Selecting a peer empties it and hands back a [`HistoryRequest`]; the
//! history response is applied only if that peer is still active when the
//! response arrives. Late responses for a superseded selection are
//! dropped instead of cancelled.
//!
//! Inbound realtime messages go through [`ConversationStore::append_remote`],
//! which appends only when the sender is the active peer. Messages from
//! any other peer are discarded, never buffered.

use tandem_chat_types::{Message, Peer, UserId};

/// A pending history load issued by [`ConversationStore::select_peer`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "the history for the selected peer must be loaded"]
pub struct HistoryRequest {
    peer_id: UserId,
}

impl HistoryRequest {
    /// The peer whose history should be fetched.
    pub fn peer_id(&self) -> &UserId {
        &self.peer_id
    }
}

/// Result of applying a history response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// The transcript was replaced with this many messages.
    Applied {
        /// Number of messages now in the transcript.
        count: usize,
    },
    /// The requested peer is no longer active; the response was dropped.
    Stale,
}

/// Result of an inbound append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAppend {
    /// The sender is the active peer; the message was appended.
    Appended,
    /// The sender is not the active peer (or none is selected); dropped.
    Discarded,
}

/// Ordered transcript for the currently selected peer.
#[derive(Debug, Default)]
pub struct ConversationStore {
    active_peer: Option<Peer>,
    messages: Vec<Message>,
}

impl ConversationStore {
    /// Create an empty store with no active peer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `peer` the active peer and empty the transcript.
    ///
    /// The returned request must be fed to [`apply_history`](Self::apply_history)
    /// once the history response arrives.
    pub fn select_peer(&mut self, peer: Peer) -> HistoryRequest {
        let request = HistoryRequest {
            peer_id: peer.id.clone(),
        };
        self.active_peer = Some(peer);
        self.messages.clear();
        request
    }

    /// Issue a fresh history load for the active peer, if any.
    ///
    /// The transcript is kept until the response is applied.
    pub fn reload(&self) -> Option<HistoryRequest> {
        self.active_peer.as_ref().map(|peer| HistoryRequest {
            peer_id: peer.id.clone(),
        })
    }

    /// Replace the transcript with a loaded history, if still relevant.
    ///
    /// Relevance is checked now, at resolution time, not when the request
    /// was issued.
    pub fn apply_history(&mut self, request: &HistoryRequest, history: Vec<Message>) -> HistoryOutcome {
        if !self.is_active(&request.peer_id) {
            return HistoryOutcome::Stale;
        }
        self.messages = history;
        HistoryOutcome::Applied {
            count: self.messages.len(),
        }
    }

    /// Append a confirmed, locally sent message to the tail.
    pub fn append_local(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append an inbound message only if `origin` is the active peer.
    pub fn append_remote(&mut self, message: Message, origin: &UserId) -> RemoteAppend {
        if !self.is_active(origin) {
            return RemoteAppend::Discarded;
        }
        self.messages.push(message);
        RemoteAppend::Appended
    }

    /// The active peer, if any.
    pub fn active_peer(&self) -> Option<&Peer> {
        self.active_peer.as_ref()
    }

    /// Whether `peer_id` is the active peer.
    pub fn is_active(&self, peer_id: &UserId) -> bool {
        self.active_peer.as_ref().is_some_and(|p| &p.id == peer_id)
    }

    /// The transcript, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Drop the active peer and transcript (logout).
    pub fn clear(&mut self) {
        self.active_peer = None;
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_chat_types::MessageId;

    fn bob() -> Peer {
        Peer::new("b", "bob")
    }

    fn carol() -> Peer {
        Peer::new("c", "carol")
    }

    fn msg(from: &str, content: &str) -> Message {
        Message::transient(UserId::from(from), from, content)
    }

    // ===========================================
    // Selection and History Tests
    // ===========================================

    #[test]
    fn select_sets_active_peer_and_clears_transcript() {
        let mut store = ConversationStore::new();
        let req = store.select_peer(bob());
        store.apply_history(&req, vec![msg("b", "old")]);

        let req = store.select_peer(carol());

        assert_eq!(req.peer_id(), &UserId::from("c"));
        assert_eq!(store.active_peer(), Some(&carol()));
        assert!(store.messages().is_empty());
    }

    #[test]
    fn history_for_active_peer_replaces_transcript() {
        let mut store = ConversationStore::new();
        let req = store.select_peer(bob());
        store.append_local(msg("a", "optimistic"));

        let outcome = store.apply_history(&req, vec![msg("b", "1"), msg("a", "2")]);

        assert_eq!(outcome, HistoryOutcome::Applied { count: 2 });
        let contents: Vec<&str> = store.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["1", "2"]);
    }

    #[test]
    fn late_history_for_superseded_peer_is_stale() {
        let mut store = ConversationStore::new();
        let first = store.select_peer(bob());
        let second = store.select_peer(carol());

        // Second resolves first, then the slow first load lands
        store.apply_history(&second, vec![msg("c", "carol history")]);
        let outcome = store.apply_history(&first, vec![msg("b", "bob history")]);

        assert_eq!(outcome, HistoryOutcome::Stale);
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].content, "carol history");
    }

    #[test]
    fn reload_targets_active_peer_and_keeps_transcript() {
        let mut store = ConversationStore::new();
        assert!(store.reload().is_none());

        let req = store.select_peer(bob());
        store.apply_history(&req, vec![msg("b", "kept")]);

        let again = store.reload().unwrap();
        assert_eq!(again.peer_id(), &UserId::from("b"));
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn history_after_clear_is_stale() {
        let mut store = ConversationStore::new();
        let req = store.select_peer(bob());
        store.clear();

        assert_eq!(store.apply_history(&req, vec![msg("b", "x")]), HistoryOutcome::Stale);
        assert!(store.messages().is_empty());
    }

    // ===========================================
    // Append Tests
    // ===========================================

    #[test]
    fn append_local_keeps_insertion_order() {
        let mut store = ConversationStore::new();
        let _ = store.select_peer(bob());
        store.append_local(msg("a", "one").with_id(MessageId::from("m1")));
        store.append_local(msg("a", "two").with_id(MessageId::from("m2")));

        let ids: Vec<_> = store.messages().iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![Some(MessageId::from("m1")), Some(MessageId::from("m2"))]);
    }

    #[test]
    fn append_remote_from_active_peer() {
        let mut store = ConversationStore::new();
        let _ = store.select_peer(bob());

        let result = store.append_remote(msg("b", "hey"), &UserId::from("b"));

        assert_eq!(result, RemoteAppend::Appended);
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn append_remote_from_other_peer_is_discarded() {
        let mut store = ConversationStore::new();
        let _ = store.select_peer(bob());

        let result = store.append_remote(msg("c", "psst"), &UserId::from("c"));

        assert_eq!(result, RemoteAppend::Discarded);
        assert!(store.messages().is_empty());
    }

    #[test]
    fn append_remote_without_active_peer_is_discarded() {
        let mut store = ConversationStore::new();
        assert_eq!(
            store.append_remote(msg("b", "hey"), &UserId::from("b")),
            RemoteAppend::Discarded
        );
    }

    #[test]
    fn discarded_messages_are_not_replayed_on_selection() {
        let mut store = ConversationStore::new();
        let _ = store.select_peer(bob());
        store.append_remote(msg("c", "missed"), &UserId::from("c"));

        let _ = store.select_peer(carol());
        assert!(store.messages().is_empty());
    }

    #[test]
    fn remote_filter_follows_every_selection() {
        // Interleave selections and inbound traffic; a message lands only
        // when its origin is the peer active at the moment of the call.
        let mut store = ConversationStore::new();
        let script: &[(&str, Option<&str>)] = &[
            ("b", None),
            ("c", None),
            ("b", Some("b")),
            ("c", Some("b")),
            ("c", Some("c")),
            ("b", Some("c")),
            ("c", Some("c")),
        ];

        let mut expected = 0;
        for (origin, select) in script {
            if let Some(peer) = select {
                let _ = store.select_peer(Peer::new(*peer, *peer));
                expected = 0;
            }
            let should_append = store.is_active(&UserId::from(*origin));
            let result = store.append_remote(msg(origin, "x"), &UserId::from(*origin));
            if should_append {
                expected += 1;
                assert_eq!(result, RemoteAppend::Appended);
            } else {
                assert_eq!(result, RemoteAppend::Discarded);
            }
            assert_eq!(store.messages().len(), expected);
        }
    }

    #[test]
    fn clear_drops_peer_and_messages() {
        let mut store = ConversationStore::new();
        let _ = store.select_peer(bob());
        store.append_local(msg("a", "hi"));

        store.clear();

        assert!(store.active_peer().is_none());
        assert!(store.messages().is_empty());
    }
}
