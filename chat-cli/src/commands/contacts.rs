//! Contact commands.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tandem_chat_client::{ChatApi, ChatClient, Transport};

use super::restore;

/// List contacts.
pub async fn list<A: ChatApi, T: Transport>(client: &ChatClient<A, T>, data_dir: &Path) -> Result<()> {
    restore(client, data_dir).await?;

    let contacts = client.contacts();
    if contacts.is_empty() {
        println!("No contacts yet. Run 'tandem search <name>' to find people.");
        return Ok(());
    }
    for peer in contacts {
        println!("  {:<20} {}", peer.display_name, peer.id);
    }
    Ok(())
}

/// Search users; with `add`, open a conversation with the first result.
pub async fn search<A: ChatApi, T: Transport>(
    client: &ChatClient<A, T>,
    data_dir: &Path,
    query: &str,
    add: bool,
) -> Result<()> {
    restore(client, data_dir).await?;

    let results = client.search(query).await.context("Search failed")?;
    if results.is_empty() {
        println!("No users match '{}'.", query.trim());
        return Ok(());
    }
    for peer in &results {
        let marker = if client.contacts().contains(peer) { "*" } else { " " };
        println!("{} {:<20} {}", marker, peer.display_name, peer.id);
    }

    if add {
        let first = &results[0];
        client
            .select_search_result(&first.id)
            .await
            .context("Failed to open conversation")?;
        if client.contacts().iter().any(|p| p.id == first.id) {
            println!("Opened conversation with {}.", first.display_name);
        } else {
            println!("Could not add {}; see warnings above.", first.display_name);
        }
    }
    Ok(())
}

/// Add a contact by exact username.
pub async fn add<A: ChatApi, T: Transport>(
    client: &ChatClient<A, T>,
    data_dir: &Path,
    username: &str,
) -> Result<()> {
    restore(client, data_dir).await?;

    if client.contacts().iter().any(|p| p.display_name == username) {
        println!("{} is already a contact.", username);
        return Ok(());
    }

    let results = client.search(username).await.context("Search failed")?;
    let Some(peer) = results.into_iter().find(|p| p.display_name == username) else {
        bail!("No user named '{}'.", username);
    };

    client
        .add_contact(peer.clone())
        .await
        .context("Failed to add contact")?;
    println!("Added {} ({}).", peer.display_name, peer.id);
    Ok(())
}
