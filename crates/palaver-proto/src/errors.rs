//! Protocol error types.
//!
//! Strongly-typed errors for frame encoding and parsing. A parse failure is
//! never fatal to a connection: the session logs and drops the single bad
//! frame, so these errors exist for reporting, not control flow.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or parsing gateway frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Inbound text was not valid JSON.
    #[error("malformed frame: {reason}")]
    MalformedFrame {
        /// Parser diagnostic for the bad frame.
        reason: String,
    },

    /// Inbound text parsed as JSON but was not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// Outbound frame serialization failed.
    #[error("frame encode failed: {reason}")]
    Encode {
        /// Serializer diagnostic.
        reason: String,
    },
}
