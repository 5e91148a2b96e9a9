//! One-shot conversation commands.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tandem_chat_client::{ChatApi, ChatClient, RejectReason, SendOutcome, Transport};

use super::{format_message, resolve_peer, restore};

/// Print the conversation with a contact.
pub async fn history<A: ChatApi, T: Transport>(
    client: &ChatClient<A, T>,
    data_dir: &Path,
    peer: &str,
) -> Result<()> {
    let identity = restore(client, data_dir).await?;
    let peer = resolve_peer(client, peer)?;

    client
        .select_peer(peer.clone())
        .await
        .context("Failed to load history")?;

    let messages = client.messages();
    if messages.is_empty() {
        println!("No messages with {} yet.", peer.display_name);
    }
    for message in &messages {
        println!("{}", format_message(&identity.id, message));
    }
    Ok(())
}

/// Send one message to a contact.
pub async fn send<A: ChatApi, T: Transport>(
    client: &ChatClient<A, T>,
    data_dir: &Path,
    peer: &str,
    text: &str,
) -> Result<()> {
    restore(client, data_dir).await?;
    let peer = resolve_peer(client, peer)?;

    client
        .select_peer(peer.clone())
        .await
        .context("Failed to open conversation")?;

    match client.send(&peer.id, text).await.context("Send failed")? {
        SendOutcome::Sent(_) => {
            println!("Sent to {}.", peer.display_name);
            Ok(())
        }
        SendOutcome::Rejected(RejectReason::EmptyContent) => bail!("Message is empty."),
        SendOutcome::Rejected(reason) => bail!("Message not sent: {:?}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::demo_backend;
    use crate::commands::testing::*;
    use tandem_chat_client::ApiCall;
    use tandem_chat_types::ChannelEvent;
    use tempfile::tempdir;

    #[tokio::test]
    async fn history_loads_conversation() {
        let dir = tempdir().unwrap();
        store_session(dir.path(), "alice").await;
        let api = demo_backend();

        history(&client(&api), dir.path(), "bob").await.unwrap();

        assert_eq!(api.call_count(ApiCall::GetMessages), 1);
    }

    #[tokio::test]
    async fn history_with_non_contact_fails_without_calls() {
        let dir = tempdir().unwrap();
        store_session(dir.path(), "alice").await;
        let api = demo_backend();

        assert!(history(&client(&api), dir.path(), "robert9").await.is_err());
        assert_eq!(api.call_count(ApiCall::GetMessages), 0);
    }

    #[tokio::test]
    async fn send_persists_and_publishes() {
        let dir = tempdir().unwrap();
        store_session(dir.path(), "alice").await;
        let api = demo_backend();
        let client = client(&api);

        send(&client, dir.path(), "u2", "see you at 6").await.unwrap();

        let stored = api.history("u1", "u2");
        assert_eq!(stored.last().map(|m| m.content.as_str()), Some("see you at 6"));
        assert!(client
            .transport()
            .sent_events()
            .iter()
            .any(|e| matches!(e, ChannelEvent::SendMessage(_))));
    }

    #[tokio::test]
    async fn blank_send_is_refused() {
        let dir = tempdir().unwrap();
        store_session(dir.path(), "alice").await;
        let api = demo_backend();

        let err = send(&client(&api), dir.path(), "bob", "   ").await.unwrap_err();

        assert!(err.to_string().contains("empty"));
        assert_eq!(api.call_count(ApiCall::SendMessage), 0);
    }
}
