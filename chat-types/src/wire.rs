//! Request/response records exchanged with the chat backend.
//!
//! The backend stores documents with a `_id` key and calls display names
//! `username`; these records mirror that shape and convert into the
//! crate's [`Peer`] and [`Message`] values.

use serde::{Deserialize, Serialize};

use crate::models::display_name_or_unknown;
use crate::{Message, MessageId, Peer, SessionToken, UserId};

/// Body of `POST /auth/login` and `POST /auth/signup`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Plain password, sent over TLS only.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Response of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Issued bearer token.
    pub token: SessionToken,
    /// Canonical account name.
    pub username: String,
}

/// A user document as returned by search and contact listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Backend id.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Account name.
    pub username: String,
}

impl From<UserRecord> for Peer {
    fn from(record: UserRecord) -> Self {
        Peer {
            id: record.id,
            display_name: record.username,
        }
    }
}

/// Response of `GET /users/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUserRecord {
    /// Backend id of the authenticated user.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Account name.
    pub username: String,
    /// Saved contacts, in the order the server stores them.
    #[serde(default)]
    pub contacts: Vec<UserRecord>,
}

/// Body of `POST /users/add`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddContactRequest {
    /// Peer to add.
    #[serde(rename = "userId")]
    pub user_id: UserId,
}

/// Sender sub-document of a message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderRecord {
    /// Backend id of the sender.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Sender name, when the backend populated it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A persisted message as returned by history and send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Server-assigned id.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Who sent it.
    pub sender: SenderRecord,
    /// Message text.
    pub content: String,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Message {
            id: record.id,
            sender_id: record.sender.id,
            sender_display_name: display_name_or_unknown(record.sender.username.unwrap_or_default()),
            content: record.content,
        }
    }
}

/// Body of `POST /messages/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Who the message is for.
    pub receiver_id: UserId,
    /// Message text.
    pub content: String,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason, if the backend sent one.
    #[serde(default)]
    pub message: Option<String>,
}
