//! Identity context for one login session.

use tandem_chat_types::Identity;
use thiserror::Error;

/// An operation needed an identity but the session has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no active session")]
pub struct NoSession;

/// Holds the authenticated identity from login until logout.
///
/// The identity is immutable once established; a new login replaces it
/// wholesale. Every establish and teardown starts a new generation, so a
/// result can be matched to the session it was requested under even when
/// a later login reuses the same token.
#[derive(Debug, Default)]
pub struct SessionContext {
    identity: Option<Identity>,
    generation: u64,
}

impl SessionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the identity for this session, replacing any previous one.
    pub fn establish(&mut self, identity: Identity) {
        self.generation += 1;
        self.identity = Some(identity);
    }

    /// The current identity, if logged in.
    pub fn current(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The current identity, or [`NoSession`].
    pub fn require(&self) -> Result<&Identity, NoSession> {
        self.identity.as_ref().ok_or(NoSession)
    }

    /// Whether an identity is installed.
    pub fn is_established(&self) -> bool {
        self.identity.is_some()
    }

    /// Drop the identity. Returns the identity that was torn down.
    ///
    /// Starts a new generation even when nothing was established.
    pub fn teardown(&mut self) -> Option<Identity> {
        self.generation += 1;
        self.identity.take()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an identity is installed and was installed at `generation`.
    pub fn is_current(&self, generation: u64) -> bool {
        self.identity.is_some() && self.generation == generation
    }
}
