//! Chat transport session for the palaver messaging gateway.
//!
//! The core is a sans-IO state machine: [`Session::handle`] consumes
//! [`SessionEvent`]s and returns [`SessionAction`]s for a driver to execute.
//! The `transport` feature adds a tokio/WebSocket driver
//! ([`transport::ConnectedSession`]) for production use; tests drive the
//! state machine directly with a virtual clock.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod event;
pub mod pending;
pub mod session;

#[cfg(feature = "transport")]
pub mod transport;

pub use env::Environment;
pub use event::{SessionAction, SessionEvent};
pub use palaver_proto::{InboundFrame, MessageBody, MessageId, OutboundFrame, RoomId, UserId};
pub use session::{ConnectionState, ECHO_TTL, RECONNECT_DELAY, Session};
