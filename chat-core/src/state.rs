//! Realtime channel state machine for Tandem.
//!
//! This module provides a pure, side-effect-free state machine for the
//! realtime connection lifecycle. The state machine takes events as input
//! and produces a new state plus a list of actions to execute.
//!
//! ```text
//! Disconnected --ConnectRequested--> Connecting --ConnectSucceeded--> Registered
//!      ^                                 |                               |
//!      +---------ConnectFailed-----------+                               |
//!      +---------ConnectionLost / DisconnectRequested--------------------+
//! ```
//!
//! The actual I/O (opening the connection, sending the register frame) is
//! performed by chat-client, not by this module. There is no reconnect
//! timer: reconnection belongs to the transport. When the transport
//! re-establishes a connection underneath a registered channel, the
//! `ConnectSucceeded` event re-issues the registration. A connection that
//! completes after a disconnect was requested is closed again.

use tandem_chat_types::UserId;

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No connection.
    #[default]
    Disconnected,
    /// Connection attempt in progress for this user.
    Connecting {
        /// Identity to register once connected.
        user_id: UserId,
    },
    /// Connected and registered; inbound traffic is routed here.
    Registered {
        /// Identity announced to the backend.
        user_id: UserId,
    },
}

impl ChannelState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (chat-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Disconnected
            (Self::Disconnected, Event::ConnectRequested { user_id }) => {
                (Self::Connecting { user_id }, vec![Action::Connect])
            }
            (Self::Disconnected, Event::ConnectSucceeded) => (Self::Disconnected, vec![Action::Close]),

            // From Connecting
            (Self::Connecting { user_id }, Event::ConnectSucceeded) => (
                Self::Registered {
                    user_id: user_id.clone(),
                },
                vec![
                    Action::Register {
                        user_id: user_id.clone(),
                    },
                    Action::Emit(StatusEvent::Registered { user_id }),
                ],
            ),
            (Self::Connecting { .. }, Event::ConnectFailed { error }) => (
                Self::Disconnected,
                vec![Action::Emit(StatusEvent::ConnectionFailed { error })],
            ),

            // From Registered
            (Self::Registered { user_id }, Event::ConnectSucceeded) => (
                Self::Registered {
                    user_id: user_id.clone(),
                },
                vec![Action::Register { user_id }],
            ),
            (Self::Registered { .. }, Event::ConnectionLost { reason }) => (
                Self::Disconnected,
                vec![Action::Emit(StatusEvent::Disconnected { reason })],
            ),

            // Teardown from any live state
            (Self::Connecting { .. } | Self::Registered { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::Close,
                    Action::Emit(StatusEvent::Disconnected {
                        reason: "user requested".into(),
                    }),
                ],
            ),

            // Invalid transitions (including repeated connects) - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if registered.
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }

    /// Check if connecting or registered.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// The user this channel belongs to, if live.
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Disconnected => None,
            Self::Connecting { user_id } | Self::Registered { user_id } => Some(user_id),
        }
    }
}

/// Events that can occur in the channel lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Session asked for a connection for this user.
    ConnectRequested {
        /// Identity to register.
        user_id: UserId,
    },
    /// Transport connection is open (first time or re-established).
    ConnectSucceeded,
    /// Transport connection failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Connection dropped while registered.
    ConnectionLost {
        /// Reason for disconnection.
        reason: String,
    },
    /// Session teardown.
    DisconnectRequested,
}

/// Actions to be executed by chat-client.
///
/// These are instructions, not side effects. The client interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the transport connection.
    Connect,
    /// Send the register frame for this user.
    Register {
        /// Identity to announce.
        user_id: UserId,
    },
    /// Close the transport.
    Close,
    /// Emit a status event to the application.
    Emit(StatusEvent),
}

/// Channel status changes reported to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Connected and registered.
    Registered {
        /// Registered identity.
        user_id: UserId,
    },
    /// Connection attempt failed.
    ConnectionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Channel is down.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::from("a")
    }

    #[test]
    fn starts_disconnected() {
        let state = ChannelState::new();
        assert!(matches!(state, ChannelState::Disconnected));
        assert!(state.user_id().is_none());
    }

    #[test]
    fn connect_request_transitions_to_connecting() {
        let state = ChannelState::Disconnected;
        let (new_state, actions) = state.on_event(Event::ConnectRequested { user_id: alice() });

        assert!(matches!(new_state, ChannelState::Connecting { .. }));
        assert_eq!(actions, vec![Action::Connect]);
    }

    #[test]
    fn connect_success_registers_identity() {
        let state = ChannelState::Connecting { user_id: alice() };
        let (new_state, actions) = state.on_event(Event::ConnectSucceeded);

        assert_eq!(new_state, ChannelState::Registered { user_id: alice() });
        assert_eq!(actions[0], Action::Register { user_id: alice() });
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Emit(StatusEvent::Registered { .. }))));
    }

    #[test]
    fn connect_failure_returns_to_disconnected() {
        let state = ChannelState::Connecting { user_id: alice() };
        let (new_state, actions) = state.on_event(Event::ConnectFailed {
            error: "refused".into(),
        });

        assert_eq!(new_state, ChannelState::Disconnected);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Emit(StatusEvent::ConnectionFailed { error }) if error == "refused"
        )));
    }

    #[test]
    fn repeated_connect_is_idempotent() {
        for state in [
            ChannelState::Connecting { user_id: alice() },
            ChannelState::Registered { user_id: alice() },
        ] {
            let (new_state, actions) = state.clone().on_event(Event::ConnectRequested {
                user_id: UserId::from("other"),
            });
            assert_eq!(new_state, state);
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn reestablished_connection_reregisters() {
        let state = ChannelState::Registered { user_id: alice() };
        let (new_state, actions) = state.on_event(Event::ConnectSucceeded);

        assert_eq!(new_state, ChannelState::Registered { user_id: alice() });
        assert_eq!(actions, vec![Action::Register { user_id: alice() }]);
    }

    #[test]
    fn connection_lost_goes_disconnected_without_close() {
        let state = ChannelState::Registered { user_id: alice() };
        let (new_state, actions) = state.on_event(Event::ConnectionLost {
            reason: "eof".into(),
        });

        assert_eq!(new_state, ChannelState::Disconnected);
        assert!(!actions.contains(&Action::Close));
    }

    #[test]
    fn disconnect_request_closes_from_live_states() {
        for state in [
            ChannelState::Connecting { user_id: alice() },
            ChannelState::Registered { user_id: alice() },
        ] {
            let (new_state, actions) = state.on_event(Event::DisconnectRequested);
            assert_eq!(new_state, ChannelState::Disconnected);
            assert!(actions.contains(&Action::Close));
        }
    }

    #[test]
    fn disconnect_when_disconnected_is_noop() {
        let (state, actions) = ChannelState::Disconnected.on_event(Event::DisconnectRequested);
        assert_eq!(state, ChannelState::Disconnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn connect_completing_after_disconnect_is_closed() {
        let (state, _) = ChannelState::Connecting { user_id: alice() }.on_event(Event::DisconnectRequested);

        let (state, actions) = state.on_event(Event::ConnectSucceeded);

        assert_eq!(state, ChannelState::Disconnected);
        assert_eq!(actions, vec![Action::Close]);
    }

    #[test]
    fn full_session_flow() {
        let state = ChannelState::new();

        let (state, _) = state.on_event(Event::ConnectRequested { user_id: alice() });
        assert!(state.is_live() && !state.is_registered());

        let (state, _) = state.on_event(Event::ConnectSucceeded);
        assert!(state.is_registered());
        assert_eq!(state.user_id(), Some(&alice()));

        let (state, _) = state.on_event(Event::DisconnectRequested);
        assert!(!state.is_live());
    }
}
