//! Interactive chat with one contact.
//!
//! Prints the history, then multiplexes three sources until `/quit` or end
//! of input: lines typed by the user (each one is sent), the realtime
//! inbound pump, and client notifications, which is where both sent and
//! received messages are printed from.

use anyhow::{Context, Result};
use std::path::Path;
use tandem_chat_client::{ChatApi, ChatClient, ClientEvent, RejectReason, SendOutcome, Transport};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;

use super::{format_message, resolve_peer, restore};

const QUIT: &str = "/quit";

/// Run the interactive session, reading lines from `input`.
pub async fn run<A, T, R>(client: &ChatClient<A, T>, data_dir: &Path, peer: &str, input: R) -> Result<()>
where
    A: ChatApi,
    T: Transport,
    R: AsyncBufRead + Unpin,
{
    let identity = restore(client, data_dir).await?;
    let peer = resolve_peer(client, peer)?;
    let mut events = client.subscribe();

    client
        .select_peer(peer.clone())
        .await
        .context("Failed to load history")?;

    println!("=== {} ===", peer.display_name);
    for message in client.messages() {
        println!("{}", format_message(&identity.id, &message));
    }
    println!("--- type a message and press enter, {} to leave ---", QUIT);

    let mut lines = input.lines();
    let inbound = client.run_inbound();
    tokio::pin!(inbound);
    let mut live = true;

    loop {
        tokio::select! {
            result = &mut inbound, if live => {
                live = false;
                match result {
                    Ok(()) => println!("--- realtime connection closed; sending still works ---"),
                    Err(e) => eprintln!("! live updates unavailable: {}", e),
                }
            }

            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                if line.trim() == QUIT {
                    break;
                }
                client.set_draft(line);
                // The other arms are not polled until the send returns. Inbound
                // frames wait in the transport and notifications in the
                // broadcast buffer, so both are delayed but not lost.
                match client.send_draft().await {
                    Ok(SendOutcome::Sent(_)) => {}
                    Ok(SendOutcome::Rejected(RejectReason::EmptyContent)) => {}
                    Ok(SendOutcome::Rejected(reason)) => eprintln!("! not sent: {:?}", reason),
                    // Already reported as a notice; the draft is kept
                    Err(_) => {}
                }
            }

            event = events.recv() => match event {
                Ok(ClientEvent::MessageAppended { message, .. }) => {
                    println!("{}", format_message(&identity.id, &message));
                }
                Ok(ClientEvent::InboundDiscarded { sender_id }) => {
                    let name = client
                        .contacts()
                        .into_iter()
                        .find(|p| p.id == sender_id)
                        .map(|p| p.display_name)
                        .unwrap_or_else(|| sender_id.to_string());
                    println!("--- new message from {} ---", name);
                }
                Ok(ClientEvent::Notice { operation, message }) => {
                    eprintln!("! {} failed: {}", operation, message);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => tracing::warn!("skipped {} notifications", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
