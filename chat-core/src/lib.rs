//! # chat-core
//!
//! Pure session, contact, and conversation state for Tandem (no I/O, instant tests).
//!
//! This crate owns every piece of client-side state the chat client
//! reconciles, without any network I/O or async, so each rule can be
//! tested directly.
//!
//! ## Components
//!
//! - [`SessionContext`]: the authenticated identity for the session
//! - [`ContactDirectory`]: known peers plus transient search results
//! - [`ConversationStore`]: the active peer and its transcript
//! - [`Composer`]: the unsent draft
//! - [`ChannelState`]: realtime connection lifecycle as a pure state machine
//!
//! Each component is the single writer of its own slice of state. The
//! I/O (requests, realtime frames) is performed by `chat-client`, which
//! calls into these types between suspension points.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod composer;
pub mod contacts;
pub mod conversation;
pub mod session;
pub mod state;

pub use composer::Composer;
pub use contacts::ContactDirectory;
pub use conversation::{ConversationStore, HistoryOutcome, HistoryRequest, RemoteAppend};
pub use session::{NoSession, SessionContext};
pub use state::{Action, ChannelState, Event, StatusEvent};
