//! Decoded discovery events.
//!
//! The wire codec and signature verification live in the transport layer;
//! by the time an event reaches this core it has been decoded and
//! authenticated. Three inbound event kinds exist:
//! - [`Ping`]: liveness probe from a remote peer
//! - [`Pong`]: acknowledgment of a probe we sent
//! - [`Neighbours`]: a batch of candidate peers from a queried node

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::Node;

/// Correlation token carried by a ping and echoed in the matching pong.
///
/// Generated randomly per outbound probe; a pong whose token does not match
/// the recorded pending probe for its sender is discarded as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeToken(u64);

impl ProbeToken {
    /// Create a token from a raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Generate a random token.
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for ProbeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// PING event: liveness probe received from a remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    /// The probing peer.
    pub from: Node,
    /// Token to echo back in the pong.
    pub token: ProbeToken,
}

impl Ping {
    /// Create a new ping event.
    pub const fn new(from: Node, token: ProbeToken) -> Self {
        Self { from, token }
    }
}

/// PONG event: acknowledgment of a probe we issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pong {
    /// The responding peer.
    pub from: Node,
    /// Token of the ping being acknowledged.
    pub token: ProbeToken,
}

impl Pong {
    /// Create a new pong event.
    pub const fn new(from: Node, token: ProbeToken) -> Self {
        Self { from, token }
    }
}

/// NEIGHBOURS event: a batch of candidate peers shared by a queried node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbours {
    /// The sharing peer.
    pub from: Node,
    /// Candidate peers; unverified until a ping/pong round-trip completes.
    pub nodes: Vec<Node>,
}

impl Neighbours {
    /// Create a new neighbours event.
    pub const fn new(from: Node, nodes: Vec<Node>) -> Self {
        Self { from, nodes }
    }
}
