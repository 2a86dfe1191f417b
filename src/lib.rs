//! Kademlia-style peer discovery core.
//!
//! This crate maintains a bounded, distance-organized set of known peers,
//! drives a fixed number of iterative discovery rounds to grow that set, and
//! tracks outstanding liveness probes so unresponsive candidates are never
//! admitted. It is transport-agnostic: wire encoding, UDP transmission and
//! signature verification belong to the host, which delivers already-decoded
//! events and supplies a send capability.
//!
//! ## Components
//!
//! | Component | Module | Description |
//! |-----------|--------|-------------|
//! | Node identity | [`identity`] | Node IDs, endpoints, XOR-distance metric |
//! | Routing table | [`routing_table`] | K-buckets, admission/eviction, pending probes |
//! | Discovery engine | [`discovery`] | Bounded iterative discovery rounds |
//! | Coordinator | [`coordinator`] | Single-owner actor serializing all mutation |
//!
//! ## Event model
//!
//! | Event | Direction | Description |
//! |-------|-----------|-------------|
//! | PING | in/out | Liveness probe carrying a correlation token |
//! | PONG | in/out | Echo of a probe's token; completes verification |
//! | NEIGHBOURS | in | Batch of candidate peers from a queried node |
//!
//! A peer enters the routing table only after a completed ping/pong
//! round-trip; neighbours batches merely seed new probes.
//!
//! ## Node URL Format
//!
//! ```text
//! kadnode://<node_id_hex>@<ip>:<port>[/<session_port>]
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use kadnet::{
//!     Coordinator, DiscoveryConfig, Endpoint, Node, NodeId, NoopObserver, ProbeToken,
//!     Transport,
//! };
//!
//! struct UdpTransport;
//!
//! impl Transport for UdpTransport {
//!     fn send_ping(&self, target: &Node, token: ProbeToken) {
//!         // encode, sign and transmit
//!     }
//!     fn send_pong(&self, target: &Node, token: ProbeToken) {
//!         // encode, sign and transmit
//!     }
//! }
//!
//! # async fn run() -> kadnet::DiscoveryResult<()> {
//! let config = DiscoveryConfig::default();
//! let local = Node::new(
//!     NodeId::random(),
//!     Endpoint::new("0.0.0.0".parse().unwrap(), config.port, config.session_port),
//! );
//! let handle = Coordinator::spawn(
//!     &config,
//!     local,
//!     Arc::new(UdpTransport),
//!     Arc::new(NoopObserver),
//! )?;
//!
//! // Decoded network events are delivered through the handle:
//! // handle.ping_received(..), handle.pong_received(..), ...
//! let peers = handle.get_peers().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Constants
//!
//! - K-bucket size: 16 nodes
//! - Discovery rounds: 7, one every 5 seconds
//! - Probe expiry sweep: every 10 seconds
//! - Default discovery port: 2126
//! - Default session port: 2125

pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod messages;
pub mod routing_table;
pub mod transport;
pub mod url;

pub use config::DiscoveryConfig;
pub use coordinator::{Coordinator, DiscoveryHandle};
pub use discovery::{DiscoveryState, RoundReport};
pub use error::{DiscoveryError, DiscoveryResult};
pub use identity::{Endpoint, Node, NodeId};
pub use messages::{Neighbours, Ping, Pong, ProbeToken};
pub use routing_table::{RoutingTable, TableSnapshot};
pub use transport::{ConnectionObserver, DiscoveryNotification, NoopObserver, Transport};
pub use url::NodeUrl;
