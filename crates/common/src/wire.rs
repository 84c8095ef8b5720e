//! Wire types carried over sockets and the message log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author attached to join/leave notices.
pub const SYSTEM_AUTHOR: &str = "System";

/// Frame received from a chat client.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub room: String,
    pub body: String,
}

impl InboundFrame {
    /// A frame is usable only when both fields carry text.
    pub fn is_valid(&self) -> bool {
        !self.room.is_empty() && !self.body.is_empty()
    }
}

/// Canonical message envelope. Built once in the read pump and immutable
/// thereafter; the same JSON form travels over sockets and the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: Uuid,
    pub room: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl WireMessage {
    /// Create a message with a fresh id, stamped now.
    pub fn new(
        room: impl Into<String>,
        author: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            room: room.into(),
            author: author.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    /// System notice (joins, leaves) addressed to a room.
    pub fn notice(room: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(room, SYSTEM_AUTHOR, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_round_trips_through_json() {
        let msg = WireMessage::new("general", "alice", "hi there");
        let json = serde_json::to_string(&msg).unwrap();
        let back: WireMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn created_at_serializes_as_rfc3339_utc() {
        let msg = WireMessage::new("general", "alice", "hi");
        let json = serde_json::to_value(&msg).unwrap();
        let stamp = json["created_at"].as_str().unwrap();
        assert!(stamp.contains('T'));
        assert!(stamp.ends_with('Z') || stamp.contains("+00:00"));
    }

    #[test]
    fn decodes_envelope_produced_by_other_services() {
        let json = r#"{
            "id": "7f9c24e5-2e53-4c1a-9d5b-6f0a8f3b2c11",
            "room": "general",
            "author": "bob",
            "body": "hello",
            "created_at": "2024-05-01T12:00:00Z"
        }"#;
        let msg: WireMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.room, "general");
        assert_eq!(msg.author, "bob");
    }

    #[test]
    fn notice_uses_the_system_author() {
        let msg = WireMessage::notice("general", "alice joined the room");
        assert_eq!(msg.author, SYSTEM_AUTHOR);
        assert_eq!(msg.room, "general");
    }

    #[test]
    fn inbound_frame_requires_both_fields() {
        let ok: InboundFrame = serde_json::from_str(r#"{"room":"r","body":"b"}"#).unwrap();
        assert!(ok.is_valid());

        let empty_room: InboundFrame = serde_json::from_str(r#"{"room":"","body":"b"}"#).unwrap();
        assert!(!empty_room.is_valid());

        let empty_body: InboundFrame = serde_json::from_str(r#"{"room":"r","body":""}"#).unwrap();
        assert!(!empty_body.is_valid());

        assert!(serde_json::from_str::<InboundFrame>(r#"{"room":"r"}"#).is_err());
    }
}
