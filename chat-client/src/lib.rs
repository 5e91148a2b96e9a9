//! # chat-client
//!
//! Client library for the Tandem realtime chat synchronizer.
//!
//! Reconciles three asynchronous sources into one transcript for the
//! selected peer:
//!
//! - **History**: fetched from the message service on selection
//! - **Outbound**: persisted via the message service, then published live
//! - **Inbound**: pushed over the realtime channel, filtered by active peer
//!
//! ## Features
//!
//! - **Service Abstraction**: request/response backend behind [`ChatApi`] (HTTP, mock)
//! - **Transport Abstraction**: realtime connection behind [`Transport`] (websocket, mock)
//! - **Pure State**: selection, contacts, and channel lifecycle live in chat-core
//! - **Race Safety**: late responses for a superseded peer or an ended session are dropped
//!
//! ## Example
//!
//! ```ignore
//! use tandem_chat_client::{ChatClient, ClientConfig};
//!
//! let client = ChatClient::from_config(ClientConfig::default())?;
//! client.login("alice", "secret").await?;
//!
//! let bob = client.contacts()[0].clone();
//! client.select_peer(bob.clone()).await?;
//! client.send(&bob.id, "hi").await?;
//!
//! // Apply inbound pushes until the connection closes
//! client.run_inbound().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod channel;
pub mod client;
pub mod events;
pub mod gate;
pub mod transport;

pub use api::{mock_token, ApiCall, ApiError, ChatApi, HttpApi, MockApi, UserProfile};
pub use channel::{ChannelError, RealtimeChannel};
pub use client::{ChatClient, ClientConfig, ClientError, RejectReason, SendOutcome};
pub use events::{ClientEvent, Operation};
pub use gate::Gate;
pub use transport::{MockTransport, Transport, TransportError, WebSocketTransport, MAX_FRAME_SIZE};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate is synchronous and short; no
/// guard is ever held across an `.await`.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
