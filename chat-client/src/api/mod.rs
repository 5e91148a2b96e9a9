//! Request/response service abstraction.
//!
//! Everything that is not realtime goes through [`ChatApi`]:
//! authentication, the user's profile and contacts, user search, message
//! history, and message persistence. Each call is one suspension point
//! for the client; no call is retried.

mod http;
mod mock;

pub use http::HttpApi;
pub use mock::{mock_token, ApiCall, MockApi};

use async_trait::async_trait;
use tandem_chat_types::wire::{CurrentUserRecord, LoginResponse};
use tandem_chat_types::{Message, Peer, SessionToken, UserId};
use thiserror::Error;

/// Failures of the request/response service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request did not complete (DNS, connect, timeout, 5xx).
    #[error("network error: {0}")]
    Network(String),

    /// Token missing, expired, or invalid.
    #[error("unauthorized")]
    Unauthorized,

    /// The backend refused on a business rule (e.g. already a contact).
    #[error("rejected by server: {0}")]
    RemoteRejected(String),

    /// Wrong username or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Signup for an account that already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// The authenticated user's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Backend id.
    pub id: UserId,
    /// Account name.
    pub display_name: String,
    /// Saved contacts in server order.
    pub contacts: Vec<Peer>,
}

impl From<CurrentUserRecord> for UserProfile {
    fn from(record: CurrentUserRecord) -> Self {
        Self {
            id: record.id,
            display_name: record.username,
            contacts: record.contacts.into_iter().map(Peer::from).collect(),
        }
    }
}

/// Request/response collaborator of the chat client.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Exchange credentials for a token.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// Create an account. Does not log in.
    async fn signup(&self, username: &str, password: &str) -> Result<(), ApiError>;

    /// Fetch the profile (id, name, contacts) the token belongs to.
    async fn current_user(&self, token: &SessionToken) -> Result<UserProfile, ApiError>;

    /// Look up users by name.
    async fn search_users(&self, token: &SessionToken, query: &str) -> Result<Vec<Peer>, ApiError>;

    /// Save a peer as a contact on the server.
    async fn add_contact(&self, token: &SessionToken, peer_id: &UserId) -> Result<(), ApiError>;

    /// Full history with one peer, oldest first.
    async fn get_messages(&self, token: &SessionToken, peer_id: &UserId) -> Result<Vec<Message>, ApiError>;

    /// Persist a message; returns the canonical server copy.
    async fn send_message(
        &self,
        token: &SessionToken,
        receiver_id: &UserId,
        content: &str,
    ) -> Result<Message, ApiError>;
}
