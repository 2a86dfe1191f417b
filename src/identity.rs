//! Node identity for the discovery core.
//!
//! Each peer is identified by a fixed-width [`NodeId`] (derived from the
//! peer's public key by the upstream identity layer; opaque here) together
//! with a network [`Endpoint`]. The XOR metric over node IDs determines
//! which k-bucket a peer belongs to and how near it is to a lookup target.

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, DiscoveryResult};

/// Node ID size in bytes.
pub const NODE_ID_SIZE: usize = 32;

/// Node ID size in bits; one k-bucket exists per bit position.
pub const NODE_ID_BITS: usize = NODE_ID_SIZE * 8;

/// A 256-bit node identifier.
///
/// The node ID is used for:
/// - Kademlia distance calculations in the routing table
/// - Identifying peers across ping/pong/neighbours events
/// - Organizing the DHT structure
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId([u8; NODE_ID_SIZE]);

impl NodeId {
    /// Create a node ID from raw bytes.
    pub const fn new(bytes: [u8; NODE_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of the node ID.
    pub const fn as_bytes(&self) -> &[u8; NODE_ID_SIZE] {
        &self.0
    }

    /// Generate a random node ID.
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Parse a node ID from a 64-character hex string.
    pub fn from_hex(s: &str) -> DiscoveryResult<Self> {
        if s.len() != NODE_ID_SIZE * 2 {
            return Err(DiscoveryError::InvalidNodeId(format!(
                "expected {} hex characters, got {}",
                NODE_ID_SIZE * 2,
                s.len()
            )));
        }
        let bytes = hex::decode(s)
            .map_err(|e| DiscoveryError::InvalidNodeId(format!("invalid hex: {}", e)))?;
        let mut id = [0u8; NODE_ID_SIZE];
        id.copy_from_slice(&bytes);
        Ok(Self(id))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", hex::encode(self.0))
    }
}

/// Network address of a peer: one host carrying a discovery port and a
/// session port (where the application protocol is served).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host IP address.
    pub ip: IpAddr,
    /// UDP port for discovery traffic.
    pub discovery_port: u16,
    /// TCP port for application sessions.
    pub session_port: u16,
}

impl Endpoint {
    /// Create a new endpoint.
    pub const fn new(ip: IpAddr, discovery_port: u16, session_port: u16) -> Self {
        Self {
            ip,
            discovery_port,
            session_port,
        }
    }

    /// Get the socket address for discovery traffic.
    pub const fn discovery_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.discovery_port)
    }

    /// Get the socket address for application sessions.
    pub const fn session_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.session_port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.ip, self.discovery_port, self.session_port)
    }
}

/// A known peer: identity plus network endpoint.
///
/// Equality and hashing are by id only: a peer that re-announces itself from
/// a new endpoint compares equal to its previous record, and the stored
/// endpoint is replaced on the next successful interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// The peer's identifier.
    pub id: NodeId,
    /// The peer's network endpoint.
    pub endpoint: Endpoint,
}

impl Node {
    /// Create a new node.
    pub const fn new(id: NodeId, endpoint: Endpoint) -> Self {
        Self { id, endpoint }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.endpoint)
    }
}

/// Calculate the XOR distance between two node IDs.
///
/// Nodes with smaller XOR distance are considered "closer" in the DHT.
pub fn xor_distance(a: &NodeId, b: &NodeId) -> [u8; NODE_ID_SIZE] {
    let mut result = [0u8; NODE_ID_SIZE];
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    for i in 0..NODE_ID_SIZE {
        result[i] = a_bytes[i] ^ b_bytes[i];
    }
    result
}

/// Calculate the log2 distance between two node IDs.
///
/// This returns the index of the most significant bit that differs between
/// the two IDs, which determines which k-bucket a node should be placed in:
/// - Bucket 0: nodes differ in the least significant bit only
/// - Bucket 255: nodes differ in the most significant bit
///
/// Returns `None` if the IDs are identical.
pub fn log2_distance(a: &NodeId, b: &NodeId) -> Option<u8> {
    let distance = xor_distance(a, b);

    // Find the first non-zero byte
    for (i, byte) in distance.iter().enumerate() {
        if *byte != 0 {
            let leading_zeros = byte.leading_zeros() as usize;
            let bit_position = i.saturating_mul(8).saturating_add(leading_zeros);
            return Some(255u8.saturating_sub(bit_position as u8));
        }
    }

    // IDs are identical
    None
}

/// Calculate the scalar distance between two node IDs.
///
/// Symmetric, and zero exactly when the IDs are equal; otherwise
/// `log2_distance + 1`. The bucket index of a distinct peer is therefore
/// `distance - 1`.
pub fn distance(a: &NodeId, b: &NodeId) -> u32 {
    match log2_distance(a, b) {
        Some(d) => u32::from(d) + 1,
        None => 0,
    }
}

/// Compare two XOR distances.
///
/// Returns:
/// - `Ordering::Less` if `a` is closer to `target` than `b`
/// - `Ordering::Greater` if `b` is closer to `target` than `a`
/// - `Ordering::Equal` if they are equidistant
pub fn compare_distance(target: &NodeId, a: &NodeId, b: &NodeId) -> Ordering {
    let dist_a = xor_distance(target, a);
    let dist_b = xor_distance(target, b);

    // Compare byte by byte (big-endian comparison)
    for i in 0..NODE_ID_SIZE {
        match dist_a[i].cmp(&dist_b[i]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn id_with_first_byte(byte: u8) -> NodeId {
        let mut bytes = [0u8; NODE_ID_SIZE];
        bytes[0] = byte;
        NodeId::new(bytes)
    }

    fn endpoint(last_octet: u8) -> Endpoint {
        Endpoint::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, last_octet)),
            2126,
            2125,
        )
    }

    #[test]
    fn test_xor_distance_self() {
        let id = NodeId::random();
        assert_eq!(xor_distance(&id, &id), [0u8; NODE_ID_SIZE]);
    }

    #[test]
    fn test_xor_distance_symmetric() {
        let a = NodeId::random();
        let b = NodeId::random();
        assert_eq!(xor_distance(&a, &b), xor_distance(&b, &a));
    }

    #[test]
    fn test_distance_zero_only_for_equal_ids() {
        let a = NodeId::random();
        let b = NodeId::random();
        assert_eq!(distance(&a, &a), 0);
        if a != b {
            assert!(distance(&a, &b) > 0);
        }
    }

    #[test]
    fn test_distance_symmetric() {
        let a = NodeId::random();
        let b = NodeId::random();
        assert_eq!(distance(&a, &b), distance(&b, &a));
    }

    #[test]
    fn test_log2_distance_identical() {
        let id = NodeId::random();
        assert_eq!(log2_distance(&id, &id), None);
    }

    #[test]
    fn test_log2_distance_known_values() {
        let zero = NodeId::new([0u8; NODE_ID_SIZE]);

        // Differ in the most significant bit -> bucket 255
        let far = id_with_first_byte(0x80);
        assert_eq!(log2_distance(&zero, &far), Some(255));

        // Differ in the least significant bit only -> bucket 0
        let mut bytes = [0u8; NODE_ID_SIZE];
        bytes[31] = 0x01;
        let close = NodeId::new(bytes);
        assert_eq!(log2_distance(&zero, &close), Some(0));

        // Differ first in the second byte -> bucket 247
        let mut bytes = [0u8; NODE_ID_SIZE];
        bytes[1] = 0x80;
        let mid = NodeId::new(bytes);
        assert_eq!(log2_distance(&zero, &mid), Some(247));
    }

    #[test]
    fn test_bucket_index_is_distance_minus_one() {
        let zero = NodeId::new([0u8; NODE_ID_SIZE]);
        let other = id_with_first_byte(0x01);
        let d = distance(&zero, &other);
        assert_eq!(log2_distance(&zero, &other), Some((d - 1) as u8));
    }

    #[test]
    fn test_compare_distance() {
        let target = NodeId::new([0u8; NODE_ID_SIZE]);
        let near = id_with_first_byte(0x01);
        let far = id_with_first_byte(0xF0);

        assert_eq!(compare_distance(&target, &near, &far), Ordering::Less);
        assert_eq!(compare_distance(&target, &far, &near), Ordering::Greater);
        assert_eq!(compare_distance(&target, &near, &near), Ordering::Equal);
    }

    #[test]
    fn test_node_id_hex_roundtrip() {
        let id = NodeId::random();
        let parsed = NodeId::from_hex(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_node_id_from_hex_rejects_bad_input() {
        assert!(NodeId::from_hex("1a2b3c").is_err());
        assert!(NodeId::from_hex(&"g".repeat(64)).is_err());
    }

    #[test]
    fn test_node_equality_by_id() {
        let id = NodeId::random();
        let a = Node::new(id, endpoint(1));
        let b = Node::new(id, endpoint(2));
        // Same peer, re-announced from a new endpoint
        assert_eq!(a, b);

        let c = Node::new(NodeId::random(), endpoint(1));
        assert_ne!(a, c);
    }

    #[test]
    fn test_endpoint_addrs() {
        let ep = endpoint(1);
        assert_eq!(ep.discovery_addr(), "127.0.0.1:2126".parse().unwrap());
        assert_eq!(ep.session_addr(), "127.0.0.1:2125".parse().unwrap());
    }
}
