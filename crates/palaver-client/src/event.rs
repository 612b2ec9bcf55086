//! Session events and actions.

use palaver_proto::{InboundFrame, OutboundFrame};

/// Events the driver feeds into the session.
///
/// The driver is responsible for:
/// - Owning the transport and reporting its lifecycle (open/frame/close/error)
/// - Driving time forward via ticks
/// - Executing the actions the session returns
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation (virtual clock) environments.
#[derive(Debug, Clone)]
pub enum SessionEvent<I = std::time::Instant> {
    /// Start the session: dial the gateway if a credential is present.
    Start,

    /// The transport finished its handshake and is ready for frames.
    TransportOpened,

    /// A text frame arrived from the gateway.
    ///
    /// Passed raw; the session parses it and decides whether to deliver,
    /// suppress, or drop it.
    FrameReceived(String),

    /// The transport closed, for any reason (network drop, server close,
    /// protocol error). Carries the current time so the session can arm the
    /// reconnect deadline without reading a clock.
    TransportClosed {
        /// Current time from the environment.
        now: I,
    },

    /// The transport reported an error. A close event normally follows; the
    /// session only marks itself disconnected here.
    TransportError,

    /// Time tick for deadline processing.
    ///
    /// The driver should send ticks periodically so the session can fire the
    /// reconnect deadline and expire stale pending-echo signatures.
    Tick {
        /// Current time from the environment.
        now: I,
    },
}

/// Actions the session produces for the driver to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Open a transport to the gateway (credential as a `token` query
    /// parameter). The driver reports the outcome back as
    /// [`SessionEvent::TransportOpened`] or [`SessionEvent::TransportClosed`].
    Connect,

    /// Transmit a frame to the gateway.
    Send(OutboundFrame),

    /// Deliver an inbound frame that survived deduplication to the consumer.
    Deliver(InboundFrame),

    /// Close the transport handle, if one exists. Close-time errors are
    /// swallowed by the driver.
    CloseTransport,

    /// Log message for debugging.
    Log {
        /// Log message.
        message: String,
    },
}
