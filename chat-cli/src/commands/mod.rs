//! CLI command implementations.

pub mod auth;
pub mod chat;
pub mod contacts;
pub mod messages;

use anyhow::{bail, Context, Result};
use std::path::Path;
use tandem_chat_client::{ChatApi, ChatClient, MockApi, Transport};
use tandem_chat_types::{Identity, Message, Peer, SessionToken, UserId};

use crate::config::StoredSession;

/// Restore the stored session, or fail with a hint to log in.
///
/// A token the backend no longer accepts is deleted.
pub async fn restore<A: ChatApi, T: Transport>(
    client: &ChatClient<A, T>,
    data_dir: &Path,
) -> Result<Identity> {
    let stored = StoredSession::load(data_dir)
        .await?
        .context("Not logged in. Run 'tandem login <username>' first.")?;

    match client.resume(SessionToken::new(stored.token)).await {
        Ok(identity) => Ok(identity),
        Err(e) if e.is_unauthorized() => {
            StoredSession::delete(data_dir).await?;
            bail!("Session expired. Run 'tandem login <username>' again.");
        }
        Err(e) => Err(e).context("Failed to restore session"),
    }
}

/// Find a contact by id or display name.
pub fn resolve_peer<A: ChatApi, T: Transport>(client: &ChatClient<A, T>, key: &str) -> Result<Peer> {
    let contacts = client.contacts();
    contacts
        .iter()
        .find(|p| p.id.as_str() == key)
        .or_else(|| contacts.iter().find(|p| p.display_name == key))
        .cloned()
        .with_context(|| format!("'{}' is not a contact. Run 'tandem add {}' first.", key, key))
}

/// One transcript line; the local user's messages are labelled "you".
pub fn format_message(me: &UserId, message: &Message) -> String {
    let who = if message.is_from(me) {
        "you"
    } else {
        message.sender_display_name.as_str()
    };
    format!("[{}] {}", who, message.content)
}

/// Seeded in-memory backend for `--mock`.
///
/// Tokens are deterministic, so a session stored by `tandem --mock login`
/// is accepted by the next `--mock` invocation.
pub fn demo_backend() -> MockApi {
    MockApi::new()
        .with_account("u1", "alice", "alice")
        .with_account("u2", "bob", "bob")
        .with_user("u9", "robert9")
        .with_contact("u1", "u2")
        .with_contact("u2", "u1")
        .with_history(
            "u1",
            "u2",
            vec![
                Message::transient(UserId::from("u2"), "bob", "hey alice"),
                Message::transient(UserId::from("u1"), "alice", "hi bob"),
            ],
        )
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tandem_chat_client::{mock_token, ClientConfig, MockTransport};

    pub type TestClient = ChatClient<MockApi, MockTransport>;

    pub fn client(api: &MockApi) -> TestClient {
        ChatClient::new(ClientConfig::default(), api.clone(), MockTransport::new())
    }

    /// Store a session for `username` as `tandem login` would.
    pub async fn store_session(data_dir: &Path, username: &str) {
        StoredSession::new(mock_token(username).expose(), username)
            .save(data_dir)
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use tandem_chat_client::mock_token;
    use tempfile::tempdir;

    // ===========================================
    // Session Restore Tests
    // ===========================================

    #[tokio::test]
    async fn restore_without_stored_session_fails() {
        let dir = tempdir().unwrap();
        let client = client(&demo_backend());

        let err = restore(&client, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
    }

    #[tokio::test]
    async fn restore_resumes_stored_session() {
        let dir = tempdir().unwrap();
        store_session(dir.path(), "alice").await;
        let client = client(&demo_backend());

        let identity = restore(&client, dir.path()).await.unwrap();

        assert_eq!(identity.id, UserId::from("u1"));
        assert_eq!(client.contacts(), vec![Peer::new("u2", "bob")]);
    }

    #[tokio::test]
    async fn restore_with_rejected_token_deletes_it() {
        let dir = tempdir().unwrap();
        store_session(dir.path(), "alice").await;
        let api = demo_backend();
        api.expire_token(&mock_token("alice"));

        let err = restore(&client(&api), dir.path()).await.unwrap_err();

        assert!(err.to_string().contains("Session expired"));
        assert!(StoredSession::load(dir.path()).await.unwrap().is_none());
    }

    // ===========================================
    // Helper Tests
    // ===========================================

    #[tokio::test]
    async fn resolve_peer_by_id_or_name() {
        let dir = tempdir().unwrap();
        store_session(dir.path(), "alice").await;
        let client = client(&demo_backend());
        restore(&client, dir.path()).await.unwrap();

        assert_eq!(resolve_peer(&client, "u2").unwrap(), Peer::new("u2", "bob"));
        assert_eq!(resolve_peer(&client, "bob").unwrap(), Peer::new("u2", "bob"));
        assert!(resolve_peer(&client, "robert9").is_err());
    }

    #[test]
    fn format_message_labels_own_messages() {
        let me = UserId::from("u1");
        let mine = Message::transient(me.clone(), "alice", "hi");
        let theirs = Message::transient(UserId::from("u2"), "", "yo");

        assert_eq!(format_message(&me, &mine), "[you] hi");
        assert_eq!(format_message(&me, &theirs), "[Unknown] yo");
    }
}
