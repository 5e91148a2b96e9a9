//! # chat-types
//!
//! Data and wire types for the Tandem chat client.
//!
//! This crate provides the foundational types used across all Tandem crates:
//! - [`UserId`], [`MessageId`] - Identifier newtypes
//! - [`Identity`], [`Peer`], [`Message`] - Session and transcript values
//! - [`ChannelEvent`] - Realtime channel events (register, send, receive)
//! - [`wire`] - Request/response records exchanged with the chat backend
//! - [`WireError`] - Encode/decode errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;
mod models;
pub mod wire;

pub use error::WireError;
pub use events::{ChannelEvent, InboundMessage, OutboundMessage};
pub use ids::{MessageId, UserId};
pub use models::{Identity, Message, Peer, SessionToken, UNKNOWN_SENDER};
