//! Collaborator seams: outbound sends and discovery notifications.
//!
//! The core never touches a socket. Outbound pings and pongs go through
//! [`Transport`], whose implementation (owned by the host) encodes, signs
//! and transmits them. Sends are fire-and-forget: a failed send simply never
//! produces a pong and is absorbed by probe expiry.

use crate::identity::Node;
use crate::messages::ProbeToken;

/// Outbound send capability provided by the transport layer.
///
/// Implementations must not block: the coordinator invokes these from its
/// event loop. Queue or spawn internally if transmission can stall.
pub trait Transport: Send + Sync {
    /// Transmit a ping carrying `token` to `target`.
    fn send_ping(&self, target: &Node, token: ProbeToken);

    /// Transmit a pong echoing `token` to `target`.
    fn send_pong(&self, target: &Node, token: ProbeToken);
}

/// Notification emitted by the coordinator to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryNotification {
    /// A discovery round finished; downstream logic decides whether to open
    /// sessions with newly discovered peers.
    RoundCompleted {
        /// The round that just completed (1-based).
        round: u32,
        /// Number of verified peers currently in the routing table.
        known_peers: usize,
    },
}

/// Observer of discovery progress.
///
/// `notify` is called from the coordinator's event loop and must be cheap;
/// hand off to a channel or task for anything heavier.
pub trait ConnectionObserver: Send + Sync {
    /// Receive a discovery notification.
    fn notify(&self, event: DiscoveryNotification);
}

/// Observer that ignores all notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ConnectionObserver for NoopObserver {
    fn notify(&self, _event: DiscoveryNotification) {}
}
