//! Realtime channel events.
//!
//! Frames on the realtime channel are JSON objects of the form
//! `{"event": "<name>", "data": <payload>}`:
//!
//! | event            | direction | payload |
//! |------------------|-----------|---------|
//! | `register`       | out       | user id string |
//! | `sendMessage`    | out       | [`OutboundMessage`] |
//! | `receiveMessage` | in        | [`InboundMessage`] |

use serde::{Deserialize, Serialize};

use crate::models::display_name_or_unknown;
use crate::{Message, UserId, WireError};

/// All events exchanged over the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ChannelEvent {
    /// Announce which user this connection belongs to.
    Register(UserId),
    /// Broadcast an already-persisted message to its receiver.
    SendMessage(OutboundMessage),
    /// A message pushed by the backend to this connection.
    ReceiveMessage(InboundMessage),
}

impl ChannelEvent {
    /// Serialize to a JSON frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Encode)
    }

    /// Deserialize from a JSON frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(bytes).map_err(WireError::Decode)
    }
}

/// Payload of a `sendMessage` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    /// Id of the sending user.
    pub sender_id: UserId,
    /// Display name of the sending user.
    pub sender_name: String,
    /// Id of the user the backend should route to.
    pub receiver_id: UserId,
    /// Message text.
    pub content: String,
}

/// Payload of a `receiveMessage` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Id of the user who sent the message.
    pub sender_id: UserId,
    /// Sender display name; some backends omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Receiver id, echoed by some backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<UserId>,
    /// Message text.
    pub content: String,
}

impl InboundMessage {
    /// Convert into a transcript entry (no server id, "Unknown" name fallback).
    pub fn to_message(&self) -> Message {
        Message {
            id: None,
            sender_id: self.sender_id.clone(),
            sender_display_name: display_name_or_unknown(
                self.sender_name.clone().unwrap_or_default(),
            ),
            content: self.content.clone(),
        }
    }
}

impl From<OutboundMessage> for InboundMessage {
    /// The event the backend delivers to the receiver for a given publish.
    fn from(out: OutboundMessage) -> Self {
        Self {
            sender_id: out.sender_id,
            sender_name: Some(out.sender_name),
            receiver_id: Some(out.receiver_id),
            content: out.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_frame_shape() {
        let event = ChannelEvent::Register(UserId::from("u1"));
        let value: serde_json::Value = serde_json::from_slice(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "register", "data": "u1"}));
    }

    #[test]
    fn send_message_frame_uses_camel_case_fields() {
        let event = ChannelEvent::SendMessage(OutboundMessage {
            sender_id: UserId::from("a"),
            sender_name: "alice".into(),
            receiver_id: UserId::from("b"),
            content: "hi".into(),
        });
        let value: serde_json::Value = serde_json::from_slice(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "sendMessage",
                "data": {"senderId": "a", "senderName": "alice", "receiverId": "b", "content": "hi"}
            })
        );
    }

    #[test]
    fn receive_message_without_name_decodes() {
        let frame = br#"{"event":"receiveMessage","data":{"senderId":"b","content":"yo"}}"#;
        let event = ChannelEvent::from_bytes(frame).unwrap();
        match event {
            ChannelEvent::ReceiveMessage(inbound) => {
                assert_eq!(inbound.sender_id, UserId::from("b"));
                assert!(inbound.sender_name.is_none());
                let msg = inbound.to_message();
                assert_eq!(msg.sender_display_name, "Unknown");
                assert_eq!(msg.content, "yo");
                assert!(msg.id.is_none());
            }
            other => panic!("Expected ReceiveMessage, got {:?}", other),
        }
    }

    #[test]
    fn unknown_event_is_a_decode_error() {
        let frame = br#"{"event":"typing","data":{"senderId":"b"}}"#;
        assert!(matches!(
            ChannelEvent::from_bytes(frame),
            Err(WireError::Decode(_))
        ));
    }

    #[test]
    fn outbound_converts_to_delivered_inbound() {
        let out = OutboundMessage {
            sender_id: UserId::from("a"),
            sender_name: "alice".into(),
            receiver_id: UserId::from("b"),
            content: "hi".into(),
        };
        let inbound = InboundMessage::from(out);
        assert_eq!(inbound.sender_name.as_deref(), Some("alice"));
        assert_eq!(inbound.receiver_id, Some(UserId::from("b")));
    }
}
