//! Session and transcript values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{MessageId, UserId};

/// Display name used when a sender's name is missing.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Bearer credential issued by the authentication service.
///
/// The token is never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Expose the raw token (for the Authorization header only).
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken([{} chars REDACTED])", self.0.len())
    }
}

/// The authenticated user for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Backend id of the user.
    pub id: UserId,
    /// Name shown to peers.
    pub display_name: String,
    /// Credential used for every request.
    pub token: SessionToken,
}

impl Identity {
    /// Create an identity.
    pub fn new(id: UserId, display_name: impl Into<String>, token: SessionToken) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            token,
        }
    }
}

/// Another user: a contact or a search result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    /// Backend id of the peer.
    pub id: UserId,
    /// Name shown in the contact list.
    pub display_name: String,
}

impl Peer {
    /// Create a peer.
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// One entry of a conversation transcript.
///
/// `id` is `None` for messages that arrived over the realtime channel;
/// canonical messages returned by the message service always carry one.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    /// Server-assigned id, if persisted.
    pub id: Option<MessageId>,
    /// Who sent it.
    pub sender_id: UserId,
    /// Sender's display name at send time.
    pub sender_display_name: String,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Create a message without a server id.
    pub fn transient(
        sender_id: UserId,
        sender_display_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            sender_id,
            sender_display_name: display_name_or_unknown(sender_display_name.into()),
            content: content.into(),
        }
    }

    /// Attach a server id.
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }

    /// Whether this message was sent by `user`.
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("sender_id", &self.sender_id)
            .field("sender_display_name", &self.sender_display_name)
            .field(
                "content",
                &format!("[{} bytes REDACTED]", self.content.len()),
            )
            .finish()
    }
}

pub(crate) fn display_name_or_unknown(name: String) -> String {
    if name.trim().is_empty() {
        UNKNOWN_SENDER.to_string()
    } else {
        name
    }
}
