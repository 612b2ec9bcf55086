//! Outbound action frames (client to gateway).
//!
//! Each variant serializes to a JSON object whose `action` field carries the
//! snake_case variant name, e.g.
//! `{"action":"join_room","recipient_id":42,"token":"..."}`.
//!
//! # Invariants
//!
//! - Exactly one `action` string per variant (enforced by the serde tag).
//! - Encoding is infallible for every value constructible from the public
//!   API; the error path exists only because serde_json's signature has one.

use serde::{Deserialize, Serialize};

use crate::{
    MessageId, RoomId, UserId,
    errors::{ProtocolError, Result},
};

/// A frame the client transmits to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Ask the gateway to bind this connection to the conversation with a
    /// recipient. Sent once per successful transport open.
    JoinRoom {
        /// The other participant in the conversation.
        recipient_id: UserId,
        /// Access credential, repeated in-band for the gateway's benefit.
        token: String,
    },

    /// Post message content to a room.
    SendMessage {
        /// Target room.
        room_id: RoomId,
        /// Message content, untrimmed.
        content: String,
    },

    /// Best-effort typing indicator for a room.
    Typing {
        /// Room the user is typing in.
        room_id: RoomId,
    },

    /// Best-effort read receipt for a single message.
    Read {
        /// Message that was read.
        message_id: MessageId,
    },
}

impl OutboundFrame {
    /// Wire discriminator for this frame.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::SendMessage { .. } => "send_message",
            Self::Typing { .. } => "typing",
            Self::Read { .. } => "read",
        }
    }

    /// Encode this frame as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode { reason: e.to_string() })
    }
}
