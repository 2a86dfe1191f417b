//! kadnode:// URL parser for bootstrap node declarations.
//!
//! Format: `kadnode://<node_id_hex>@<ip>:<discovery_port>[/<session_port>]`
//!
//! Example: `kadnode://1a2b3c4d5e6f...@192.168.1.1:2126/2125`
//!
//! The session port defaults to [`DEFAULT_SESSION_PORT`] when omitted.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::config::DEFAULT_SESSION_PORT;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::identity::{Endpoint, Node, NodeId, NODE_ID_SIZE};

/// URL scheme for discovery nodes.
pub const KADNODE_URL_SCHEME: &str = "kadnode://";

/// Parsed kadnode:// URL containing a node ID and endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeUrl {
    /// The node ID (32 bytes).
    pub node_id: NodeId,
    /// The node's endpoint.
    pub endpoint: Endpoint,
}

impl NodeUrl {
    /// Create a new NodeUrl.
    pub const fn new(node_id: NodeId, endpoint: Endpoint) -> Self {
        Self { node_id, endpoint }
    }

    /// The node this URL describes.
    pub fn node(&self) -> Node {
        Node::new(self.node_id, self.endpoint)
    }

    /// Parse a kadnode:// URL string.
    ///
    /// # Returns
    /// * `Ok(NodeUrl)` if parsing succeeds
    /// * `Err(DiscoveryError::InvalidUrl)` if the format is invalid
    pub fn parse(s: &str) -> DiscoveryResult<Self> {
        // Check scheme
        let rest = s.strip_prefix(KADNODE_URL_SCHEME).ok_or_else(|| {
            DiscoveryError::InvalidUrl(format!(
                "URL must start with '{}', got: {}",
                KADNODE_URL_SCHEME, s
            ))
        })?;

        // Split node_id@address
        let (node_id_hex, address_str) = rest.split_once('@').ok_or_else(|| {
            DiscoveryError::InvalidUrl(format!(
                "URL must contain '@' separator between node_id and address: {}",
                s
            ))
        })?;

        // Validate and parse node ID (64 hex chars = 32 bytes)
        if node_id_hex.len() != NODE_ID_SIZE * 2 {
            return Err(DiscoveryError::InvalidUrl(format!(
                "Node ID must be {} hex characters ({} bytes), got {} characters",
                NODE_ID_SIZE * 2,
                NODE_ID_SIZE,
                node_id_hex.len()
            )));
        }

        let node_id = NodeId::from_hex(node_id_hex)
            .map_err(|e| DiscoveryError::InvalidUrl(format!("Invalid node ID hex: {}", e)))?;

        // Split off the optional session port suffix
        let (discovery_str, session_port) = match address_str.rsplit_once('/') {
            Some((addr, session)) => {
                let port: u16 = session.parse().map_err(|e| {
                    DiscoveryError::InvalidUrl(format!("Invalid session port '{}': {}", session, e))
                })?;
                (addr, port)
            }
            None => (address_str, DEFAULT_SESSION_PORT),
        };

        // Parse socket address
        let address: SocketAddr = discovery_str.parse().map_err(|e| {
            DiscoveryError::InvalidUrl(format!(
                "Invalid socket address '{}': {}",
                discovery_str, e
            ))
        })?;

        Ok(Self {
            node_id,
            endpoint: Endpoint::new(address.ip(), address.port(), session_port),
        })
    }

    /// Convert to URL string.
    pub fn to_string_url(&self) -> String {
        format!(
            "{}{}@{}/{}",
            KADNODE_URL_SCHEME,
            self.node_id,
            self.endpoint.discovery_addr(),
            self.endpoint.session_port
        )
    }
}

impl fmt::Display for NodeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_url())
    }
}

impl FromStr for NodeUrl {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    fn sample_node_id() -> NodeId {
        NodeId::new([
            0x1a, 0x2b, 0x3c, 0x4d, 0x5e, 0x6f, 0x70, 0x81, 0x92, 0xa3, 0xb4, 0xc5, 0xd6, 0xe7,
            0xf8, 0x09, 0x10, 0x21, 0x32, 0x43, 0x54, 0x65, 0x76, 0x87, 0x98, 0xa9, 0xba, 0xcb,
            0xdc, 0xed, 0xfe, 0x0f,
        ])
    }

    #[test]
    fn test_parse_valid_ipv4() {
        let node_id = sample_node_id();
        let url_str = format!("kadnode://{}@192.168.1.1:2126/2125", node_id);

        let parsed = NodeUrl::parse(&url_str).unwrap();
        assert_eq!(parsed.node_id, node_id);
        assert_eq!(
            parsed.endpoint,
            Endpoint::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)), 2126, 2125)
        );
    }

    #[test]
    fn test_parse_valid_ipv6() {
        let node_id = sample_node_id();
        let url_str = format!("kadnode://{}@[::1]:2126/2125", node_id);

        let parsed = NodeUrl::parse(&url_str).unwrap();
        assert_eq!(parsed.endpoint.ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(parsed.endpoint.discovery_port, 2126);
    }

    #[test]
    fn test_parse_defaults_session_port() {
        let node_id = sample_node_id();
        let url_str = format!("kadnode://{}@10.0.0.1:2126", node_id);

        let parsed = NodeUrl::parse(&url_str).unwrap();
        assert_eq!(parsed.endpoint.session_port, DEFAULT_SESSION_PORT);
    }

    #[test]
    fn test_parse_missing_scheme() {
        let result = NodeUrl::parse("1a2b3c@127.0.0.1:2126");
        assert!(result.is_err());
        if let Err(DiscoveryError::InvalidUrl(msg)) = result {
            assert!(msg.contains("kadnode://"));
        }
    }

    #[test]
    fn test_parse_missing_separator() {
        let node_id = sample_node_id();
        let url_str = format!("kadnode://{}192.168.1.1:2126", node_id);

        let result = NodeUrl::parse(&url_str);
        assert!(result.is_err());
        if let Err(DiscoveryError::InvalidUrl(msg)) = result {
            assert!(msg.contains("@"));
        }
    }

    #[test]
    fn test_parse_invalid_node_id_length() {
        let result = NodeUrl::parse("kadnode://1a2b3c@192.168.1.1:2126");
        assert!(result.is_err());
        if let Err(DiscoveryError::InvalidUrl(msg)) = result {
            assert!(msg.contains("64 hex characters"));
        }
    }

    #[test]
    fn test_parse_invalid_address() {
        let node_id = sample_node_id();
        let url_str = format!("kadnode://{}@not-an-address", node_id);

        let result = NodeUrl::parse(&url_str);
        assert!(result.is_err());
        if let Err(DiscoveryError::InvalidUrl(msg)) = result {
            assert!(msg.contains("Invalid socket address"));
        }
    }

    #[test]
    fn test_parse_invalid_session_port() {
        let node_id = sample_node_id();
        let url_str = format!("kadnode://{}@192.168.1.1:2126/notaport", node_id);

        let result = NodeUrl::parse(&url_str);
        assert!(result.is_err());
        if let Err(DiscoveryError::InvalidUrl(msg)) = result {
            assert!(msg.contains("Invalid session port"));
        }
    }

    #[test]
    fn test_roundtrip() {
        let url = NodeUrl::new(
            sample_node_id(),
            Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 2126, 2125),
        );

        let parsed = NodeUrl::parse(&url.to_string_url()).unwrap();
        assert_eq!(parsed, url);
    }

    #[test]
    fn test_display() {
        let url = NodeUrl::new(
            sample_node_id(),
            Endpoint::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 2126, 2125),
        );

        let displayed = format!("{}", url);
        assert!(displayed.starts_with(KADNODE_URL_SCHEME));
        assert!(displayed.contains("@127.0.0.1:2126/2125"));
    }

    #[test]
    fn test_from_str() {
        let node_id = sample_node_id();
        let url_str = format!("kadnode://{}@192.168.1.1:2126/2125", node_id);

        let parsed: NodeUrl = url_str.parse().unwrap();
        assert_eq!(parsed.node_id, node_id);
    }
}
