//! Pending-send signature registry for echo suppression.
//!
//! The gateway reflects every posted message back to its sender. To keep the
//! consumer from displaying duplicates, a signature of each outgoing message
//! is registered just before transmission; the first matching echo consumes
//! the signature and is discarded instead of delivered.
//!
//! # Invariants
//!
//! - At most one entry per distinct `(room, trimmed content)` pair. Sending
//!   identical content twice in quick succession overwrites the window, so
//!   only one echo is absorbed, a documented limitation of the protocol,
//!   not a bug to fix.
//! - An entry expires a fixed interval after insertion whether or not an
//!   echo arrived. Expiry is checked lazily on lookup and swept on tick, so
//!   a late echo is delivered even if no tick ran in between.

use std::{collections::HashMap, time::Duration};

use palaver_proto::RoomId;

/// Registry of signatures awaiting their gateway echo.
///
/// Generic over `I` (Instant type); entries store their insertion time and
/// age out after the configured ttl.
#[derive(Debug, Clone)]
pub struct PendingEchoes<I> {
    ttl: Duration,
    entries: HashMap<String, I>,
}

/// Composite signature: `room_id + "|" + content.trim()`.
fn signature(room_id: RoomId, content: &str) -> String {
    format!("{room_id}|{}", content.trim())
}

impl<I> PendingEchoes<I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    /// Create an empty registry whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    /// Register an outgoing message, replacing any entry for the same
    /// signature.
    pub fn insert(&mut self, room_id: RoomId, content: &str, now: I) {
        self.entries.insert(signature(room_id, content), now);
    }

    /// Consume the signature for an inbound echo.
    ///
    /// Returns `true` if a live entry existed (the echo should be
    /// suppressed). An expired entry is removed and reported as absent, so a
    /// late echo flows through to the consumer.
    pub fn take(&mut self, room_id: RoomId, content: &str, now: I) -> bool {
        let key = signature(room_id, content);
        match self.entries.remove(&key) {
            Some(inserted) => now - inserted < self.ttl,
            None => false,
        }
    }

    /// Drop every entry older than the ttl. Returns how many were removed.
    pub fn sweep(&mut self, now: I) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, inserted| now - *inserted < ttl);
        before - self.entries.len()
    }

    /// Number of live-or-stale entries currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
