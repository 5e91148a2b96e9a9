//! In-memory chat backend for tests.
//!
//! Keeps accounts, contacts and conversation histories the way the real
//! service does, records every call, and can inject failures or hold a
//! response until the test releases it.

use super::{ApiError, ChatApi, UserProfile};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tandem_chat_types::wire::LoginResponse;
use tandem_chat_types::{Message, MessageId, Peer, SessionToken, UserId};

use crate::gate::Gate;
use crate::lock;

/// One kind of request, as recorded by [`MockApi::calls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ApiCall {
    Login,
    Signup,
    CurrentUser,
    SearchUsers,
    AddContact,
    GetMessages,
    SendMessage,
}

#[derive(Debug)]
struct Account {
    password: String,
}

#[derive(Debug, Default)]
struct MockApiInner {
    /// username -> account
    accounts: HashMap<String, Account>,
    /// Every known user, accounts included, in creation order.
    users: Vec<Peer>,
    /// token -> user id
    tokens: HashMap<String, UserId>,
    contacts: HashMap<UserId, Vec<UserId>>,
    /// Keyed by the sorted pair of participants.
    histories: HashMap<(UserId, UserId), Vec<Message>>,
    /// Held `get_messages`, keyed by peer.
    history_gates: HashMap<UserId, Gate>,
    /// Held calls of any other kind.
    gates: HashMap<ApiCall, Gate>,
    failures: HashMap<ApiCall, ApiError>,
    calls: Vec<ApiCall>,
    next_user: usize,
    next_message: usize,
}

impl MockApiInner {
    fn authenticate(&self, token: &SessionToken) -> Result<UserId, ApiError> {
        self.tokens
            .get(token.expose())
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }

    fn peer(&self, id: &UserId) -> Option<&Peer> {
        self.users.iter().find(|p| &p.id == id)
    }

    fn add_user(&mut self, id: UserId, name: &str) {
        if self.peer(&id).is_none() {
            self.users.push(Peer::new(id, name));
        }
    }
}

fn conversation_key(a: &UserId, b: &UserId) -> (UserId, UserId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Token issued by [`MockApi`] for `username`.
pub fn mock_token(username: &str) -> SessionToken {
    SessionToken::new(format!("token-{username}"))
}

/// Fake chat backend.
///
/// Clones share state, so a test can keep one handle while the client
/// owns another.
#[derive(Debug, Default, Clone)]
pub struct MockApi {
    inner: Arc<Mutex<MockApiInner>>,
}

impl MockApi {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account that can log in. Its token is [`mock_token`]`(username)`.
    pub fn with_account(self, id: &str, username: &str, password: &str) -> Self {
        {
            let mut inner = lock(&self.inner);
            let id = UserId::from(id);
            inner.accounts.insert(
                username.to_string(),
                Account {
                    password: password.to_string(),
                },
            );
            inner.tokens.insert(mock_token(username).expose().to_string(), id.clone());
            inner.add_user(id, username);
        }
        self
    }

    /// Add a searchable user without credentials.
    pub fn with_user(self, id: &str, username: &str) -> Self {
        lock(&self.inner).add_user(UserId::from(id), username);
        self
    }

    /// Save `peer` as a contact of `owner` on the server.
    pub fn with_contact(self, owner: &str, peer: &str) -> Self {
        lock(&self.inner)
            .contacts
            .entry(UserId::from(owner))
            .or_default()
            .push(UserId::from(peer));
        self
    }

    /// Seed the conversation between `a` and `b`.
    pub fn with_history(self, a: &str, b: &str, messages: Vec<Message>) -> Self {
        lock(&self.inner)
            .histories
            .insert(conversation_key(&UserId::from(a), &UserId::from(b)), messages);
        self
    }

    /// Make the next call of `call` fail with `error`.
    pub fn fail_next(&self, call: ApiCall, error: ApiError) {
        lock(&self.inner).failures.insert(call, error);
    }

    /// Invalidate an issued token.
    pub fn expire_token(&self, token: &SessionToken) {
        lock(&self.inner).tokens.remove(token.expose());
    }

    /// Hold the next `get_messages` for `peer_id` until the gate is released.
    pub fn hold_history(&self, peer_id: &str) -> Gate {
        let gate = Gate::new();
        lock(&self.inner)
            .history_gates
            .insert(UserId::from(peer_id), gate.clone());
        gate
    }

    /// Hold the next `call` until the gate is released. Use
    /// [`hold_history`](Self::hold_history) for `get_messages`.
    pub fn hold(&self, call: ApiCall) -> Gate {
        let gate = Gate::new();
        lock(&self.inner).gates.insert(call, gate.clone());
        gate
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.inner).calls.clone()
    }

    /// How many times `call` was made.
    pub fn call_count(&self, call: ApiCall) -> usize {
        lock(&self.inner).calls.iter().filter(|c| **c == call).count()
    }

    /// Server-side contacts of `owner`.
    pub fn contacts_of(&self, owner: &str) -> Vec<UserId> {
        lock(&self.inner)
            .contacts
            .get(&UserId::from(owner))
            .cloned()
            .unwrap_or_default()
    }

    /// Record `call`, wait while it is held, then apply any injected failure.
    async fn enter(&self, call: ApiCall, gate: Option<Gate>) -> Result<(), ApiError> {
        let gate = {
            let mut inner = lock(&self.inner);
            inner.calls.push(call);
            gate.or_else(|| inner.gates.remove(&call))
        };

        // A held response resolves (or fails) only once released
        if let Some(gate) = gate {
            gate.passed().await;
        }

        match lock(&self.inner).failures.remove(&call) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Stored conversation between `a` and `b`.
    pub fn history(&self, a: &str, b: &str) -> Vec<Message> {
        lock(&self.inner)
            .histories
            .get(&conversation_key(&UserId::from(a), &UserId::from(b)))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.enter(ApiCall::Login, None).await?;
        let inner = lock(&self.inner);
        match inner.accounts.get(username) {
            Some(account) if account.password == password => Ok(LoginResponse {
                token: mock_token(username),
                username: username.to_string(),
            }),
            _ => Err(ApiError::InvalidCredentials),
        }
    }

    async fn signup(&self, username: &str, password: &str) -> Result<(), ApiError> {
        self.enter(ApiCall::Signup, None).await?;
        let mut inner = lock(&self.inner);
        if inner.accounts.contains_key(username) {
            return Err(ApiError::Conflict("User already exists".into()));
        }
        inner.next_user += 1;
        let id = UserId::new(format!("new{}", inner.next_user));
        inner.accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
            },
        );
        inner.tokens.insert(mock_token(username).expose().to_string(), id.clone());
        inner.add_user(id, username);
        Ok(())
    }

    async fn current_user(&self, token: &SessionToken) -> Result<UserProfile, ApiError> {
        self.enter(ApiCall::CurrentUser, None).await?;
        let inner = lock(&self.inner);
        let me = inner.authenticate(token)?;
        let display_name = inner
            .peer(&me)
            .map(|p| p.display_name.clone())
            .unwrap_or_default();
        let contacts = inner
            .contacts
            .get(&me)
            .map(|ids| ids.iter().filter_map(|id| inner.peer(id).cloned()).collect())
            .unwrap_or_default();
        Ok(UserProfile {
            id: me,
            display_name,
            contacts,
        })
    }

    async fn search_users(&self, token: &SessionToken, query: &str) -> Result<Vec<Peer>, ApiError> {
        self.enter(ApiCall::SearchUsers, None).await?;
        let inner = lock(&self.inner);
        let me = inner.authenticate(token)?;
        let needle = query.to_lowercase();
        Ok(inner
            .users
            .iter()
            .filter(|p| p.id != me && p.display_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn add_contact(&self, token: &SessionToken, peer_id: &UserId) -> Result<(), ApiError> {
        self.enter(ApiCall::AddContact, None).await?;
        let mut inner = lock(&self.inner);
        let me = inner.authenticate(token)?;
        if inner.peer(peer_id).is_none() {
            return Err(ApiError::RemoteRejected("User not found".into()));
        }
        if &me == peer_id {
            return Err(ApiError::RemoteRejected("Cannot add yourself".into()));
        }
        let contacts = inner.contacts.entry(me).or_default();
        if contacts.contains(peer_id) {
            return Err(ApiError::RemoteRejected("User already in contacts".into()));
        }
        contacts.push(peer_id.clone());
        Ok(())
    }

    async fn get_messages(&self, token: &SessionToken, peer_id: &UserId) -> Result<Vec<Message>, ApiError> {
        let gate = lock(&self.inner).history_gates.remove(peer_id);
        self.enter(ApiCall::GetMessages, gate).await?;

        let inner = lock(&self.inner);
        let me = inner.authenticate(token)?;
        Ok(inner
            .histories
            .get(&conversation_key(&me, peer_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        token: &SessionToken,
        receiver_id: &UserId,
        content: &str,
    ) -> Result<Message, ApiError> {
        self.enter(ApiCall::SendMessage, None).await?;
        let mut inner = lock(&self.inner);
        let me = inner.authenticate(token)?;
        if inner.peer(receiver_id).is_none() {
            return Err(ApiError::RemoteRejected("Receiver not found".into()));
        }
        let name = inner
            .peer(&me)
            .map(|p| p.display_name.clone())
            .unwrap_or_default();

        inner.next_message += 1;
        let id = MessageId::new(format!("m{}", inner.next_message));
        let message = Message::transient(me.clone(), name, content).with_id(id);
        inner
            .histories
            .entry(conversation_key(&me, receiver_id))
            .or_default()
            .push(message.clone());
        Ok(message)
    }
}
