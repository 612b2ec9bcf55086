//! Chat transport session state machine.
//!
//! The `Session` manages one logical connection to the messaging gateway:
//! joining the conversation for a recipient, adopting the gateway-assigned
//! room binding, suppressing self-echoed messages, and recovering from
//! transport failures with a fixed-delay reconnect. It is pure state machine
//! logic: drivers feed [`SessionEvent`]s in and execute the returned
//! [`SessionAction`]s, which keeps the session deterministic and testable
//! without sockets or sleeps.
//!
//! # State Machine
//!
//! ```text
//!           Start (credential)        open
//! ┌──────┐ ───────────────────> ┌────────────┐ ───────> ┌──────┐
//! │ Idle │                      │ Connecting │          │ Open │
//! └──────┘ <─────────────────── └────────────┘          └──────┘
//!     ↑         disconnect            ↑                     │
//!     │                               │ deadline            │ close / error
//!     │                        ┌────────────────┐           │
//!     └─────────────────────── │ RetryScheduled │ <─────────┘
//!            disconnect        └────────────────┘
//! ```
//!
//! A session without a credential never leaves `Idle`; that is a supported
//! configuration, not an error.

use std::time::Duration;

use palaver_proto::{InboundFrame, MessageId, OutboundFrame, RoomId, UserId};

use crate::{
    env::Environment,
    event::{SessionAction, SessionEvent},
    pending::PendingEchoes,
};

/// Delay between a transport close and the next connect attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Lifetime of a pending-send signature awaiting its gateway echo.
pub const ECHO_TTL: Duration = Duration::from_secs(5);

/// The wire discriminator of chat message frames.
const MESSAGE_ACTION: &str = "message";

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started, missing a credential, or explicitly disconnected.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// Transport open; frames flow.
    Open,
    /// Transport lost. A retry fires when the single reconnect deadline
    /// (armed only by the close handler) elapses.
    RetryScheduled,
}

/// Chat transport session for one recipient.
///
/// # Invariants
///
/// - The transport handle and the reconnect deadline are exclusively owned
///   by one session instance; callers interact only through the operations
///   and the delivered frames.
/// - Exactly one reconnect deadline exists at a time: arming overwrites the
///   previous one, teardown clears it.
/// - A message is only transmitted while the transport is open and a room id
///   is resolvable; otherwise the operation is a silent no-op (no queueing).
pub struct Session<E: Environment> {
    /// Environment for timing.
    env: E,

    /// Access credential, absent for logged-out callers.
    token: Option<String>,

    /// The other conversation participant. Immutable for the session's
    /// lifetime.
    recipient_id: UserId,

    /// Our own user id, used only for echo detection.
    self_id: Option<UserId>,

    /// Lifecycle state.
    state: ConnectionState,

    /// Gateway-assigned room binding, unset until the gateway confirms.
    room_id: Option<RoomId>,

    /// Signatures of sent messages awaiting their echo.
    pending_echoes: PendingEchoes<E::Instant>,

    /// When the transport closed; the reconnect deadline is this plus
    /// [`RECONNECT_DELAY`].
    retry_since: Option<E::Instant>,
}

impl<E: Environment> Session<E> {
    /// Create a session for a recipient.
    ///
    /// `self_id` enables echo detection; without it every inbound message is
    /// delivered, including reflections of our own sends.
    pub fn new(
        env: E,
        token: Option<String>,
        recipient_id: UserId,
        self_id: Option<UserId>,
    ) -> Self {
        Self {
            env,
            token,
            recipient_id,
            self_id,
            state: ConnectionState::Idle,
            room_id: None,
            pending_echoes: PendingEchoes::new(ECHO_TTL),
            retry_since: None,
        }
    }

    /// Whether the transport is currently open.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Currently known room binding. `None` until the gateway confirms one.
    pub fn room_id(&self) -> Option<RoomId> {
        self.room_id
    }

    /// Recipient this session converses with.
    pub fn recipient_id(&self) -> UserId {
        self.recipient_id
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: SessionEvent<E::Instant>) -> Vec<SessionAction> {
        match event {
            SessionEvent::Start => self.handle_start(),
            SessionEvent::TransportOpened => self.handle_opened(),
            SessionEvent::FrameReceived(text) => self.handle_frame(&text),
            SessionEvent::TransportClosed { now } => self.handle_closed(now),
            SessionEvent::TransportError => self.handle_transport_error(),
            SessionEvent::Tick { now } => self.handle_tick(now),
        }
    }

    fn handle_start(&mut self) -> Vec<SessionAction> {
        if self.state != ConnectionState::Idle {
            return vec![log("ignoring start: session already running")];
        }

        if self.token.is_none() {
            // Not an error: a logged-out caller gets a session that simply
            // reports itself disconnected.
            return vec![log("no access credential; staying disconnected")];
        }

        self.state = ConnectionState::Connecting;
        vec![SessionAction::Connect]
    }

    fn handle_opened(&mut self) -> Vec<SessionAction> {
        if self.state == ConnectionState::Idle {
            // A dial that completed after an explicit disconnect; the
            // session no longer owns that handle.
            return vec![
                log("ignoring transport open after teardown"),
                SessionAction::CloseTransport,
            ];
        }

        let Some(token) = self.token.clone() else {
            return vec![log("transport opened without a credential"), SessionAction::CloseTransport];
        };

        self.state = ConnectionState::Open;
        self.retry_since = None;

        vec![
            log(format!("connected; joining room for recipient {}", self.recipient_id)),
            SessionAction::Send(OutboundFrame::JoinRoom {
                recipient_id: self.recipient_id,
                token,
            }),
        ]
    }

    /// Handle an inbound text frame.
    ///
    /// A malformed frame is logged and dropped; it never terminates the
    /// connection. Any frame carrying a numeric `room_id` updates the room
    /// binding (last writer wins) before the dedup check runs.
    fn handle_frame(&mut self, text: &str) -> Vec<SessionAction> {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => return vec![log(format!("dropping malformed frame: {e}"))],
        };

        if let Some(room_id) = frame.room_id() {
            self.room_id = Some(room_id);
        }

        if self.consume_echo(&frame) {
            return vec![log("suppressed gateway echo of own message")];
        }

        vec![SessionAction::Deliver(frame)]
    }

    /// Check whether `frame` is the gateway's reflection of a message this
    /// session just sent, consuming the pending signature if so.
    ///
    /// A message from our own user id with no pending signature is NOT an
    /// echo: it is a legitimate message sent from another device and must be
    /// delivered.
    fn consume_echo(&mut self, frame: &InboundFrame) -> bool {
        if frame.action() != Some(MESSAGE_ACTION) {
            return false;
        }
        let Some(self_id) = self.self_id else {
            return false;
        };
        let Some(body) = frame.message() else {
            return false;
        };
        if body.sender_id != Some(self_id) {
            return false;
        }
        let (Some(room_id), Some(content)) = (frame.room_id(), body.content.as_deref()) else {
            return false;
        };

        let now = self.env.now();
        self.pending_echoes.take(room_id, content, now)
    }

    fn handle_closed(&mut self, now: E::Instant) -> Vec<SessionAction> {
        if self.state == ConnectionState::Idle {
            // Close delivered after an explicit disconnect; a retry here
            // would resurrect the timer the teardown just cancelled.
            return vec![log("ignoring transport close after teardown")];
        }

        self.state = ConnectionState::RetryScheduled;
        self.retry_since = Some(now);
        vec![log(format!("transport closed; reconnecting in {}s", RECONNECT_DELAY.as_secs()))]
    }

    /// A transport error marks the session disconnected but arms no deadline
    /// of its own: the close event that normally follows schedules the
    /// retry, and if one was already armed by a prior close it still
    /// governs.
    fn handle_transport_error(&mut self) -> Vec<SessionAction> {
        match self.state {
            ConnectionState::Open | ConnectionState::Connecting => {
                self.state = ConnectionState::RetryScheduled;
                vec![log("transport error; awaiting close")]
            },
            ConnectionState::Idle | ConnectionState::RetryScheduled => Vec::new(),
        }
    }

    /// Handle a tick: expire stale pending-echo signatures and fire the
    /// reconnect deadline.
    fn handle_tick(&mut self, now: E::Instant) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        let expired = self.pending_echoes.sweep(now);
        if expired > 0 {
            actions.push(log(format!("expired {expired} unanswered echo signature(s)")));
        }

        if self.state == ConnectionState::RetryScheduled
            && let Some(since) = self.retry_since
            && now - since >= RECONNECT_DELAY
        {
            self.retry_since = None;
            self.state = ConnectionState::Connecting;
            actions.push(log("reconnect deadline elapsed; dialing gateway"));
            actions.push(SessionAction::Connect);
        }

        actions
    }

    /// Send message content to the bound room.
    ///
    /// `room_override` targets an explicit room instead of the learned
    /// binding. Registers the echo signature before handing the frame out,
    /// so the transmission (driver-side) can never race the echo.
    ///
    /// Returns `None` (transmitting nothing) when the transport is not
    /// open or no room id is resolvable. There is no queueing and no
    /// acknowledgement: `Some` means "frame handed to the transport", not
    /// "delivered".
    pub fn send_message(
        &mut self,
        content: &str,
        room_override: Option<RoomId>,
    ) -> Option<OutboundFrame> {
        if self.state != ConnectionState::Open {
            return None;
        }
        let room_id = room_override.or(self.room_id)?;

        let now = self.env.now();
        self.pending_echoes.insert(room_id, content, now);

        Some(OutboundFrame::SendMessage { room_id, content: content.to_string() })
    }

    /// Best-effort typing indicator. `None` (silent no-op) unless the
    /// transport is open and a room id is known.
    pub fn send_typing(&mut self) -> Option<OutboundFrame> {
        if self.state != ConnectionState::Open {
            return None;
        }
        let room_id = self.room_id?;
        Some(OutboundFrame::Typing { room_id })
    }

    /// Best-effort read receipt. Same gating as [`Session::send_typing`].
    pub fn mark_read(&mut self, message_id: MessageId) -> Option<OutboundFrame> {
        if self.state != ConnectionState::Open {
            return None;
        }
        self.room_id?;
        Some(OutboundFrame::Read { message_id })
    }

    /// Tear the session down: cancel the reconnect deadline, close the
    /// transport (the driver swallows close-time errors), and mark the
    /// session disconnected.
    ///
    /// Idempotent: disconnecting an already-idle session is a no-op.
    pub fn disconnect(&mut self) -> Vec<SessionAction> {
        self.retry_since = None;

        if self.state == ConnectionState::Idle {
            return Vec::new();
        }

        self.state = ConnectionState::Idle;
        vec![SessionAction::CloseTransport, log("session disconnected")]
    }
}

fn log(message: impl Into<String>) -> SessionAction {
    SessionAction::Log { message: message.into() }
}
