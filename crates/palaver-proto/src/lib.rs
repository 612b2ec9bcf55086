//! Wire protocol for the palaver chat gateway.
//!
//! The gateway speaks JSON text frames over a persistent bidirectional
//! connection. Every frame is a JSON object discriminated by an `action`
//! field. Outbound frames (client to gateway) are fully typed; inbound
//! frames are parsed leniently because the session forwards anything it does
//! not recognize to the consumer unchanged.
//!
//! # Invariants
//!
//! - Every [`OutboundFrame`] variant maps to exactly one `action` string.
//! - Parsing never loses information: an [`InboundFrame`] keeps the raw JSON
//!   value, and typed accessors only read the fields the session needs for
//!   its own bookkeeping.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod errors;
mod inbound;
mod outbound;

pub use errors::{ProtocolError, Result};
pub use inbound::{InboundFrame, MessageBody};
pub use outbound::OutboundFrame;

/// Stable numeric identifier for a user account.
pub type UserId = u64;

/// Gateway-assigned identifier for a conversation.
pub type RoomId = u64;

/// Gateway-assigned identifier for a single message.
pub type MessageId = u64;
