//! WebSocket transport driver for the session.
//!
//! Provides [`ConnectedSession`], which owns a [`Session`] on a background
//! tokio task and bridges it to a WebSocket: commands go in over a channel,
//! surviving inbound frames come out over another. This is a thin layer that
//! executes the actions the session emits; all protocol logic stays in the
//! Sans-IO [`Session`].

use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use palaver_proto::{InboundFrame, MessageId, OutboundFrame, RoomId, UserId};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot, watch},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::{
    env::Environment,
    event::{SessionAction, SessionEvent},
    session::Session,
};

/// How often the driver ticks the session for deadline processing.
const TICK_INTERVAL: Duration = Duration::from_millis(500);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// System-clock environment for production drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// WebSocket stream error.
    #[error("stream error: {0}")]
    Stream(String),
}

/// Connection parameters for [`connect`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Gateway WebSocket URL, without the credential (e.g. `wss://…/chat`).
    pub gateway_url: String,
    /// Access credential, appended as a `token` query parameter. `None`
    /// yields a session that stays disconnected.
    pub token: Option<String>,
    /// The conversation partner to join a room with.
    pub recipient_id: UserId,
    /// Our own user id, for echo suppression.
    pub self_id: Option<UserId>,
}

/// Snapshot of the session published on the status channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatus {
    /// Whether the transport is open.
    pub connected: bool,
    /// Gateway-assigned room binding, once known.
    pub room_id: Option<RoomId>,
}

/// Commands the handle sends to the session task.
///
/// Send-style commands reply with whether a frame was handed to the
/// transport; `false` means the silent-failure path (disconnected or no
/// room) was taken.
enum Command {
    SendMessage { content: String, room_override: Option<RoomId>, reply: oneshot::Sender<bool> },
    SendTyping { reply: oneshot::Sender<bool> },
    MarkRead { message_id: MessageId, reply: oneshot::Sender<bool> },
    Disconnect,
}

/// Handle to a running session.
///
/// Dropping the handle closes the command channel, which tears the session
/// down; [`ConnectedSession::stop`] aborts it immediately.
pub struct ConnectedSession {
    commands: mpsc::Sender<Command>,
    /// Frames that survived deduplication, in arrival order.
    pub inbound: mpsc::Receiver<InboundFrame>,
    status: watch::Receiver<SessionStatus>,
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedSession {
    /// Send message content to the bound room (or `room_override`).
    ///
    /// Returns whether a frame was handed to the transport. `false` means
    /// the session was disconnected or had no room to target; the message
    /// is not queued.
    pub async fn send_message(&self, content: &str, room_override: Option<RoomId>) -> bool {
        let (reply, rx) = oneshot::channel();
        let cmd = Command::SendMessage { content: content.to_string(), room_override, reply };
        self.request(cmd, rx).await
    }

    /// Best-effort typing indicator.
    pub async fn send_typing(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        self.request(Command::SendTyping { reply }, rx).await
    }

    /// Best-effort read receipt.
    pub async fn mark_read(&self, message_id: MessageId) -> bool {
        let (reply, rx) = oneshot::channel();
        self.request(Command::MarkRead { message_id, reply }, rx).await
    }

    /// Tear the session down. Idempotent; safe to call on an already
    /// stopped session.
    pub async fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect).await;
    }

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Subscribe to status changes.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Abort the session task without a clean shutdown.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }

    async fn request(&self, cmd: Command, rx: oneshot::Receiver<bool>) -> bool {
        if self.commands.send(cmd).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

/// Start a session against the gateway.
///
/// Spawns the session task on the current tokio runtime and returns the
/// handle. Connection failures are not surfaced here: the session retries
/// on its own schedule, and [`ConnectedSession::status`] reports progress.
pub fn connect(config: TransportConfig) -> ConnectedSession {
    let env = SystemEnv;
    let session = Session::new(
        env,
        config.token.clone(),
        config.recipient_id,
        config.self_id,
    );

    let (commands_tx, commands_rx) = mpsc::channel(32);
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    let (status_tx, status_rx) = watch::channel(SessionStatus::default());

    let url = match &config.token {
        Some(token) => gateway_url(&config.gateway_url, token),
        None => config.gateway_url.clone(),
    };

    let handle = tokio::spawn(run_session(session, url, commands_rx, inbound_tx, status_tx));

    ConnectedSession {
        commands: commands_tx,
        inbound: inbound_rx,
        status: status_rx,
        abort_handle: handle.abort_handle(),
    }
}

/// Gateway URL with the credential attached.
fn gateway_url(base: &str, token: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}token={token}")
}

/// Transport-side state the action executor mutates.
struct Driver {
    url: String,
    socket: Option<WsStream>,
    inbound: mpsc::Sender<InboundFrame>,
}

/// Outcome of waiting on the socket.
enum Incoming {
    Text(String),
    Closed,
    Failed,
}

/// Run the session task: wait for commands, socket traffic, and ticks, feed
/// them to the session, and execute the resulting actions.
async fn run_session(
    mut session: Session<SystemEnv>,
    url: String,
    mut commands: mpsc::Receiver<Command>,
    inbound: mpsc::Sender<InboundFrame>,
    status: watch::Sender<SessionStatus>,
) {
    let env = SystemEnv;
    let mut driver = Driver { url, socket: None, inbound };

    let actions = session.handle(SessionEvent::Start);
    execute_actions(&mut driver, &mut session, actions).await;
    publish_status(&status, &session);

    loop {
        let actions = tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    Some(cmd) => handle_command(&mut session, cmd),
                    // All handles dropped: clean teardown.
                    None => {
                        let actions = session.disconnect();
                        execute_actions(&mut driver, &mut session, actions).await;
                        publish_status(&status, &session);
                        return;
                    },
                }
            },
            incoming = next_frame(&mut driver.socket) => {
                match incoming {
                    Incoming::Text(text) => session.handle(SessionEvent::FrameReceived(text)),
                    Incoming::Closed => {
                        driver.socket = None;
                        session.handle(SessionEvent::TransportClosed { now: env.now() })
                    },
                    Incoming::Failed => {
                        driver.socket = None;
                        let mut actions = session.handle(SessionEvent::TransportError);
                        actions.extend(session.handle(SessionEvent::TransportClosed {
                            now: env.now(),
                        }));
                        actions
                    },
                }
            },
            () = env.sleep(TICK_INTERVAL) => {
                session.handle(SessionEvent::Tick { now: env.now() })
            },
        };

        execute_actions(&mut driver, &mut session, actions).await;
        publish_status(&status, &session);
    }
}

fn publish_status(status: &watch::Sender<SessionStatus>, session: &Session<SystemEnv>) {
    let snapshot = SessionStatus { connected: session.is_connected(), room_id: session.room_id() };
    // send_if_modified keeps watchers from waking on no-op cycles.
    status.send_if_modified(|current| {
        if *current == snapshot {
            false
        } else {
            *current = snapshot;
            true
        }
    });
}

/// Translate a command into session actions, answering the reply channel.
fn handle_command(session: &mut Session<SystemEnv>, cmd: Command) -> Vec<SessionAction> {
    let (frame, reply) = match cmd {
        Command::SendMessage { content, room_override, reply } => {
            (session.send_message(&content, room_override), reply)
        },
        Command::SendTyping { reply } => (session.send_typing(), reply),
        Command::MarkRead { message_id, reply } => (session.mark_read(message_id), reply),
        Command::Disconnect => return session.disconnect(),
    };

    let _ = reply.send(frame.is_some());
    frame.map(SessionAction::Send).into_iter().collect()
}

/// Execute actions, feeding driver-side outcomes (dial results, write
/// failures) back into the session until the action queue drains.
async fn execute_actions(
    driver: &mut Driver,
    session: &mut Session<SystemEnv>,
    initial: Vec<SessionAction>,
) {
    let env = SystemEnv;
    let mut pending = initial;

    while !pending.is_empty() {
        for action in std::mem::take(&mut pending) {
            match action {
                SessionAction::Connect => match connect_async(driver.url.as_str()).await {
                    Ok((socket, _response)) => {
                        driver.socket = Some(socket);
                        pending.extend(session.handle(SessionEvent::TransportOpened));
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "gateway dial failed");
                        pending.extend(
                            session.handle(SessionEvent::TransportClosed { now: env.now() }),
                        );
                    },
                },
                SessionAction::Send(frame) => {
                    if let Err(e) = transmit(driver, &frame).await {
                        tracing::warn!(error = %e, "frame transmit failed");
                        driver.socket = None;
                        pending.extend(session.handle(SessionEvent::TransportError));
                        pending.extend(
                            session.handle(SessionEvent::TransportClosed { now: env.now() }),
                        );
                    }
                },
                SessionAction::Deliver(frame) => {
                    // A full consumer queue drops the frame rather than
                    // stalling the transport.
                    if let Err(e) = driver.inbound.try_send(frame) {
                        tracing::warn!(error = %e, "inbound queue full; dropping frame");
                    }
                },
                SessionAction::CloseTransport => {
                    if let Some(mut socket) = driver.socket.take() {
                        // Close-time errors are irrelevant: the handle is
                        // gone either way.
                        let _ = socket.close(None).await;
                    }
                },
                SessionAction::Log { message } => tracing::debug!("{message}"),
            }
        }
    }
}

/// Encode and write a frame to the socket.
async fn transmit(driver: &mut Driver, frame: &OutboundFrame) -> Result<(), TransportError> {
    let text = frame
        .encode()
        .map_err(|e| TransportError::Stream(format!("encode failed: {e}")))?;

    let Some(socket) = driver.socket.as_mut() else {
        return Err(TransportError::Connection("socket not open".to_string()));
    };

    socket
        .send(Message::Text(text))
        .await
        .map_err(|e| TransportError::Stream(format!("write failed: {e}")))
}

/// Wait for the next text frame, skipping control messages.
///
/// Pends forever while no socket is open so the select loop only wakes for
/// commands and ticks.
async fn next_frame(socket: &mut Option<WsStream>) -> Incoming {
    let Some(socket) = socket.as_mut() else {
        return std::future::pending().await;
    };

    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => return Incoming::Text(text),
            Some(Ok(Message::Close(_))) | None => return Incoming::Closed,
            Some(Ok(_)) => {}, // ping/pong/binary: not part of the protocol
            Some(Err(_)) => return Incoming::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_url_appends_token() {
        assert_eq!(gateway_url("wss://gw.example/chat", "abc"), "wss://gw.example/chat?token=abc");
        assert_eq!(
            gateway_url("wss://gw.example/chat?v=2", "abc"),
            "wss://gw.example/chat?v=2&token=abc"
        );
    }
}
