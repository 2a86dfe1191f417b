//! Configuration for the discovery core.

use serde::{Deserialize, Serialize};

use crate::error::DiscoveryResult;
use crate::identity::Node;
use crate::routing_table::DEFAULT_BUCKET_SIZE;
use crate::url::NodeUrl;

/// Default UDP port for discovery traffic.
pub const DEFAULT_DISCOVERY_PORT: u16 = 2126;

/// Default TCP port for application sessions.
pub const DEFAULT_SESSION_PORT: u16 = 2125;

/// Default bucket size for the Kademlia routing table.
const fn default_bucket_size() -> usize {
    DEFAULT_BUCKET_SIZE
}

/// Default discovery port.
const fn default_discovery_port() -> u16 {
    DEFAULT_DISCOVERY_PORT
}

/// Default session port.
const fn default_session_port() -> u16 {
    DEFAULT_SESSION_PORT
}

/// Configuration for the discovery core.
///
/// Protocol cadence (discovery round period and cap, cleanup period) is
/// fixed by constants in [`crate::discovery`] and [`crate::coordinator`],
/// not configured here.
#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// UDP port for the discovery protocol.
    #[clap(name = "discovery-port", long, default_value_t = default_discovery_port())]
    #[serde(default = "default_discovery_port")]
    pub port: u16,

    /// TCP port announced for application sessions.
    #[clap(name = "session-port", long, default_value_t = default_session_port())]
    #[serde(default = "default_session_port")]
    pub session_port: u16,

    /// Bootstrap nodes to probe on startup.
    ///
    /// Format: kadnode://<node_id_hex>@<ip>:<port>[/<session_port>]
    #[clap(name = "discovery-bootstrap", long)]
    #[serde(default)]
    pub bootstrap_nodes: Vec<String>,

    /// Kademlia bucket size (k parameter).
    ///
    /// Number of nodes stored per bucket in the routing table.
    #[clap(name = "discovery-bucket-size", long, default_value_t = default_bucket_size())]
    #[serde(default = "default_bucket_size")]
    pub bucket_size: usize,

    /// Disable the discovery protocol.
    ///
    /// When disabled, the node will not participate in peer discovery
    /// and will only connect to manually specified peers.
    #[clap(name = "disable-discovery", long)]
    #[serde(default)]
    pub disable: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DISCOVERY_PORT,
            session_port: DEFAULT_SESSION_PORT,
            bootstrap_nodes: Vec::new(),
            bucket_size: DEFAULT_BUCKET_SIZE,
            disable: false,
        }
    }
}

impl DiscoveryConfig {
    /// Check if discovery is enabled.
    pub fn is_enabled(&self) -> bool {
        !self.disable
    }

    /// Parse the configured bootstrap URLs into nodes.
    pub fn parse_bootstrap_nodes(&self) -> DiscoveryResult<Vec<Node>> {
        self.bootstrap_nodes
            .iter()
            .map(|s| NodeUrl::parse(s).map(|url| url.node()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NodeId;

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();

        assert_eq!(config.port, DEFAULT_DISCOVERY_PORT);
        assert_eq!(config.session_port, DEFAULT_SESSION_PORT);
        assert!(config.bootstrap_nodes.is_empty());
        assert_eq!(config.bucket_size, DEFAULT_BUCKET_SIZE);
        assert!(!config.disable);
    }

    #[test]
    fn test_is_enabled() {
        let mut config = DiscoveryConfig::default();
        assert!(config.is_enabled());

        config.disable = true;
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_parse_bootstrap_nodes() {
        let id = NodeId::random();
        let config = DiscoveryConfig {
            bootstrap_nodes: vec![format!("kadnode://{}@127.0.0.1:2126/2125", id)],
            ..Default::default()
        };

        let nodes = config.parse_bootstrap_nodes().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, id);
        assert_eq!(nodes[0].endpoint.discovery_port, 2126);
    }

    #[test]
    fn test_parse_bootstrap_nodes_rejects_invalid_url() {
        let config = DiscoveryConfig {
            bootstrap_nodes: vec!["not-a-url".to_string()],
            ..Default::default()
        };

        assert!(config.parse_bootstrap_nodes().is_err());
    }
}
