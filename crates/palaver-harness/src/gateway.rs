//! Scripted in-memory gateway.

use palaver_proto::{MessageId, OutboundFrame, RoomId, UserId};
use serde_json::json;

/// Simulated messaging gateway.
///
/// Records every frame the session transmits and, when configured, replies
/// the way the real gateway does: a room binding on join, an echo of each
/// posted message.
#[derive(Debug, Default)]
pub struct SimGateway {
    auto_room: Option<RoomId>,
    echo_sender: Option<UserId>,
    received: Vec<OutboundFrame>,
    next_message_id: MessageId,
}

impl SimGateway {
    /// Gateway that accepts frames but never replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `join_room` with a binding for `room_id`.
    #[must_use]
    pub fn with_auto_room(mut self, room_id: RoomId) -> Self {
        self.auto_room = Some(room_id);
        self
    }

    /// Echo every posted message back, attributed to `sender_id`.
    #[must_use]
    pub fn with_echo_from(mut self, sender_id: UserId) -> Self {
        self.echo_sender = Some(sender_id);
        self
    }

    /// Accept a frame from the session, returning the gateway's replies as
    /// raw wire text.
    pub fn receive(&mut self, frame: OutboundFrame) -> Vec<String> {
        let replies = match &frame {
            OutboundFrame::JoinRoom { .. } => match self.auto_room {
                Some(room_id) => {
                    vec![json!({ "action": "room_joined", "room_id": room_id }).to_string()]
                },
                None => Vec::new(),
            },
            OutboundFrame::SendMessage { room_id, content } => match self.echo_sender {
                Some(sender_id) => {
                    self.next_message_id += 1;
                    vec![message_frame(*room_id, sender_id, content, self.next_message_id)]
                },
                None => Vec::new(),
            },
            OutboundFrame::Typing { .. } | OutboundFrame::Read { .. } => Vec::new(),
        };

        self.received.push(frame);
        replies
    }

    /// Every frame received so far, in transmission order.
    #[must_use]
    pub fn received(&self) -> &[OutboundFrame] {
        &self.received
    }

    /// Drop the recorded frames, returning them.
    pub fn drain_received(&mut self) -> Vec<OutboundFrame> {
        std::mem::take(&mut self.received)
    }
}

/// Build a raw `message` frame the way the gateway emits them.
#[must_use]
pub fn message_frame(room_id: RoomId, sender_id: UserId, content: &str, id: MessageId) -> String {
    json!({
        "action": "message",
        "room_id": room_id,
        "message": {
            "id": id,
            "sender_id": sender_id,
            "content": content,
            "timestamp": "2026-01-01T00:00:00Z",
        },
    })
    .to_string()
}
