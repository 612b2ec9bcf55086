//! Synchronous session driver over the simulated gateway.

use std::time::Duration;

use palaver_client::{
    ConnectionState, Environment, InboundFrame, MessageId, OutboundFrame, RoomId, Session,
    SessionAction, SessionEvent, UserId, env::test_utils::MockEnv,
};

use crate::SimGateway;

/// Drives a [`Session`] against a [`SimGateway`] on a virtual clock.
///
/// Mirrors what the production transport driver does, minus the IO: actions
/// are executed inline, gateway replies loop straight back into the session,
/// and delivered frames and log lines are captured for assertions.
pub struct SimDriver {
    env: MockEnv,
    session: Session<MockEnv>,
    gateway: SimGateway,
    /// Dial attempts that should fail before one succeeds.
    refuse_dials: usize,
    dials: usize,
    socket_open: bool,
    delivered: Vec<InboundFrame>,
    logs: Vec<String>,
}

impl SimDriver {
    /// Build a driver around a fresh session.
    #[must_use]
    pub fn new(
        gateway: SimGateway,
        token: Option<String>,
        recipient_id: UserId,
        self_id: Option<UserId>,
    ) -> Self {
        let env = MockEnv::new();
        let session = Session::new(env.clone(), token, recipient_id, self_id);
        Self {
            env,
            session,
            gateway,
            refuse_dials: 0,
            dials: 0,
            socket_open: false,
            delivered: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Make the next `n` dial attempts fail with an immediate close.
    pub fn refuse_next_dials(&mut self, n: usize) {
        self.refuse_dials = n;
    }

    /// Start the session (dials unless the credential is absent).
    pub fn start(&mut self) {
        let actions = self.session.handle(SessionEvent::Start);
        self.execute(actions);
    }

    /// Advance the clock and tick the session once.
    pub fn advance(&mut self, delta: Duration) {
        self.env.advance(delta);
        let actions = self.session.handle(SessionEvent::Tick { now: self.env.now() });
        self.execute(actions);
    }

    /// Sever the transport, as a network drop would.
    pub fn drop_connection(&mut self) {
        self.socket_open = false;
        let actions = self.session.handle(SessionEvent::TransportClosed { now: self.env.now() });
        self.execute(actions);
    }

    /// Report a transport error without a close.
    pub fn transport_error(&mut self) {
        let actions = self.session.handle(SessionEvent::TransportError);
        self.execute(actions);
    }

    /// Push a raw frame to the session, bypassing the gateway script.
    pub fn deliver_raw(&mut self, text: &str) {
        let actions = self.session.handle(SessionEvent::FrameReceived(text.to_string()));
        self.execute(actions);
    }

    /// Send message content through the session.
    pub fn send_message(&mut self, content: &str, room_override: Option<RoomId>) -> bool {
        let frame = self.session.send_message(content, room_override);
        self.transmit(frame)
    }

    /// Send a typing indicator through the session.
    pub fn send_typing(&mut self) -> bool {
        let frame = self.session.send_typing();
        self.transmit(frame)
    }

    /// Send a read receipt through the session.
    pub fn mark_read(&mut self, message_id: MessageId) -> bool {
        let frame = self.session.mark_read(message_id);
        self.transmit(frame)
    }

    /// Tear the session down.
    pub fn disconnect(&mut self) {
        let actions = self.session.disconnect();
        self.execute(actions);
    }

    /// Whether the session considers itself connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Session lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Room binding the session has adopted.
    #[must_use]
    pub fn room_id(&self) -> Option<RoomId> {
        self.session.room_id()
    }

    /// Number of dial attempts so far (successful or refused).
    #[must_use]
    pub fn dials(&self) -> usize {
        self.dials
    }

    /// Frames delivered to the consumer so far.
    #[must_use]
    pub fn delivered(&self) -> &[InboundFrame] {
        &self.delivered
    }

    /// Drop and return the delivered frames.
    pub fn drain_delivered(&mut self) -> Vec<InboundFrame> {
        std::mem::take(&mut self.delivered)
    }

    /// Log lines the session emitted.
    #[must_use]
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// The scripted gateway.
    pub fn gateway_mut(&mut self) -> &mut SimGateway {
        &mut self.gateway
    }

    fn transmit(&mut self, frame: Option<OutboundFrame>) -> bool {
        match frame {
            Some(frame) => {
                self.execute(vec![SessionAction::Send(frame)]);
                true
            },
            None => false,
        }
    }

    /// Execute actions until the queue drains, feeding gateway replies and
    /// dial outcomes back into the session.
    fn execute(&mut self, initial: Vec<SessionAction>) {
        let mut pending = initial;

        while !pending.is_empty() {
            for action in std::mem::take(&mut pending) {
                match action {
                    SessionAction::Connect => {
                        self.dials += 1;
                        if self.refuse_dials > 0 {
                            self.refuse_dials -= 1;
                            pending.extend(self.session.handle(SessionEvent::TransportClosed {
                                now: self.env.now(),
                            }));
                        } else {
                            self.socket_open = true;
                            pending.extend(self.session.handle(SessionEvent::TransportOpened));
                        }
                    },
                    SessionAction::Send(frame) => {
                        if self.socket_open {
                            for reply in self.gateway.receive(frame) {
                                pending.extend(
                                    self.session.handle(SessionEvent::FrameReceived(reply)),
                                );
                            }
                        }
                    },
                    SessionAction::Deliver(frame) => self.delivered.push(frame),
                    SessionAction::CloseTransport => self.socket_open = false,
                    SessionAction::Log { message } => self.logs.push(message),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_flow_reaches_open_with_a_room() {
        let gateway = SimGateway::new().with_auto_room(99);
        let mut driver = SimDriver::new(gateway, Some("tok".to_string()), 42, Some(7));

        driver.start();

        assert!(driver.is_connected());
        assert_eq!(driver.room_id(), Some(99));
        assert_eq!(driver.gateway_mut().received().len(), 1);
    }

    #[test]
    fn refused_dial_schedules_a_retry() {
        let gateway = SimGateway::new().with_auto_room(99);
        let mut driver = SimDriver::new(gateway, Some("tok".to_string()), 42, Some(7));
        driver.refuse_next_dials(1);

        driver.start();
        assert!(!driver.is_connected());
        assert_eq!(driver.dials(), 1);

        driver.advance(Duration::from_secs(3));
        assert!(driver.is_connected());
        assert_eq!(driver.dials(), 2);
    }
}
