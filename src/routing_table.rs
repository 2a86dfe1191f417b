//! Kademlia-style routing table with liveness bookkeeping.
//!
//! The routing table organizes verified peers into k-buckets based on their
//! XOR distance from the local node's ID, and tracks outstanding liveness
//! probes awaiting their pong. A peer enters the table on first contact only
//! through a completed ping/pong round-trip; buckets evict their
//! least-recently-seen entry only when that entry is not itself awaiting a
//! probe response.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::identity::{compare_distance, log2_distance, Endpoint, Node, NodeId, NODE_ID_BITS};
use crate::messages::{Neighbours, Ping, Pong, ProbeToken};
use crate::transport::Transport;

/// Number of k-buckets (one for each bit position).
pub const NUM_BUCKETS: usize = NODE_ID_BITS;

/// Default number of nodes per bucket (Kademlia k parameter).
pub const DEFAULT_BUCKET_SIZE: usize = 16;

/// Entry in a k-bucket containing a verified peer and recency metadata.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    /// The peer.
    pub node: Node,
    /// When this entry was last confirmed live or refreshed.
    pub last_seen: Instant,
}

impl NodeEntry {
    fn new(node: Node) -> Self {
        Self {
            node,
            last_seen: Instant::now(),
        }
    }
}

/// An outbound liveness probe awaiting its pong.
#[derive(Debug, Clone)]
pub struct PendingProbe {
    /// The probed peer.
    pub node: Node,
    /// Token the pong must echo.
    pub token: ProbeToken,
    /// When the probe was issued.
    pub issued_at: Instant,
}

/// A single k-bucket holding nodes at a specific distance range.
///
/// Entries are kept in recency order: front = least-recently-seen (the
/// eviction candidate), back = most-recently-seen.
#[derive(Debug)]
struct KBucket {
    nodes: VecDeque<NodeEntry>,
    capacity: usize,
}

impl KBucket {
    fn new(capacity: usize) -> Self {
        Self {
            nodes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn is_full(&self) -> bool {
        self.nodes.len() >= self.capacity
    }

    /// Find a node by ID and return its index.
    fn find_index(&self, node_id: &NodeId) -> Option<usize> {
        self.nodes.iter().position(|e| e.node.id == *node_id)
    }

    fn get(&self, node_id: &NodeId) -> Option<&NodeEntry> {
        self.nodes.iter().find(|e| e.node.id == *node_id)
    }

    /// Move an existing entry to the most-recently-seen position, replacing
    /// its stored endpoint with the freshly announced one.
    fn touch(&mut self, index: usize, endpoint: Endpoint) {
        if let Some(mut entry) = self.nodes.remove(index) {
            entry.node.endpoint = endpoint;
            entry.last_seen = Instant::now();
            self.nodes.push_back(entry);
        }
    }

    /// Insert a node at the most-recently-seen position.
    ///
    /// Caller must ensure the bucket is not full.
    fn insert(&mut self, node: Node) {
        self.nodes.push_back(NodeEntry::new(node));
    }

    /// The least-recently-seen entry (eviction candidate).
    fn least_recently_seen(&self) -> Option<&NodeEntry> {
        self.nodes.front()
    }

    /// Evict the least-recently-seen entry.
    fn evict_least_recently_seen(&mut self) -> Option<NodeEntry> {
        self.nodes.pop_front()
    }

    fn iter(&self) -> impl Iterator<Item = &NodeEntry> {
        self.nodes.iter()
    }
}

/// Snapshot of a single non-empty bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSnapshot {
    /// Bucket index (most significant differing bit position).
    pub index: usize,
    /// Members, least-recently-seen first.
    pub nodes: Vec<Node>,
}

/// Serializable snapshot of the routing table at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// The local node.
    pub local: Node,
    /// Non-empty buckets.
    pub buckets: Vec<BucketSnapshot>,
    /// Number of probes currently awaiting a pong.
    pub pending_probes: usize,
    /// Completed discovery rounds.
    pub discovery_round: u32,
}

impl TableSnapshot {
    /// Total number of verified peers in the snapshot.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.nodes.len()).sum()
    }

    /// Check if the snapshot holds no peers.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Check whether a peer appears in the snapshot.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.buckets
            .iter()
            .any(|b| b.nodes.iter().any(|n| n.id == *node_id))
    }
}

/// Kademlia-style routing table.
///
/// Owned exclusively by the discovery coordinator; every mutation happens on
/// its event loop, so no internal locking is needed.
pub struct RoutingTable {
    /// The local node.
    local: Node,
    /// K-buckets indexed by log2 distance.
    buckets: Vec<KBucket>,
    /// Outstanding probes keyed by target id; at most one per target.
    pending_probes: HashMap<NodeId, PendingProbe>,
    /// Completed discovery rounds.
    discovery_round: u32,
    /// Outbound send capability.
    transport: Arc<dyn Transport>,
}

impl RoutingTable {
    /// Create a new routing table and probe every bootstrap node.
    ///
    /// Bootstrap nodes are not inserted directly: they enter the table like
    /// any other peer, once their pong comes back.
    pub fn new(
        local: Node,
        bootstrap_nodes: &[Node],
        bucket_size: usize,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let buckets = (0..NUM_BUCKETS).map(|_| KBucket::new(bucket_size)).collect();
        let mut table = Self {
            local,
            buckets,
            pending_probes: HashMap::new(),
            discovery_round: 0,
            transport,
        };

        for node in bootstrap_nodes {
            table.ping(node.clone());
        }

        table
    }

    /// Get the local node.
    pub fn local(&self) -> &Node {
        &self.local
    }

    /// Get the bucket capacity (k parameter).
    pub fn bucket_size(&self) -> usize {
        self.buckets.first().map(|b| b.capacity).unwrap_or(0)
    }

    /// Number of completed discovery rounds.
    pub fn discovery_round(&self) -> u32 {
        self.discovery_round
    }

    /// Record one more completed discovery round.
    pub(crate) fn advance_round(&mut self) {
        self.discovery_round = self.discovery_round.saturating_add(1);
    }

    /// Calculate which bucket a node belongs to.
    fn bucket_index(&self, node_id: &NodeId) -> Option<usize> {
        log2_distance(&self.local.id, node_id).map(usize::from)
    }

    /// Mark a node as freshly seen.
    ///
    /// If it is already a member, it moves to the most-recently-seen
    /// position and its endpoint is updated. If it is absent and its bucket
    /// has capacity, it is inserted. If the bucket is full, nothing happens:
    /// first-contact admission requires a verified round-trip and goes
    /// through [`handle_pong`](Self::handle_pong), and this operation never
    /// evicts.
    pub fn refresh_node(&mut self, node: Node) {
        let Some(index) = self.bucket_index(&node.id) else {
            return;
        };
        let bucket = &mut self.buckets[index];
        if let Some(position) = bucket.find_index(&node.id) {
            bucket.touch(position, node.endpoint);
        } else if !bucket.is_full() {
            bucket.insert(node);
        }
    }

    /// Issue a liveness probe to a node.
    ///
    /// Records a pending probe (replacing any prior probe for the same id)
    /// and hands the ping to the transport. The node is admitted only when
    /// the matching pong arrives.
    pub fn ping(&mut self, node: Node) {
        if node.id == self.local.id {
            return;
        }
        let token = ProbeToken::random();
        self.transport.send_ping(&node, token);
        self.pending_probes.insert(
            node.id,
            PendingProbe {
                node,
                token,
                issued_at: Instant::now(),
            },
        );
    }

    /// Handle a ping received from a remote peer.
    ///
    /// Responds with a pong echoing the token, then refreshes the sender:
    /// a received ping proves liveness in the opposite direction. Never
    /// evicts to make room.
    pub fn handle_ping(&mut self, ping: Ping) {
        self.transport.send_pong(&ping.from, ping.token);
        self.refresh_node(ping.from);
    }

    /// Handle a pong received from a remote peer.
    ///
    /// A pong with no matching pending probe, or with a stale token, is
    /// discarded without any state change. A matching pong clears the probe
    /// and admits the sender; this is the sole first-contact admission path.
    pub fn handle_pong(&mut self, pong: Pong) {
        match self.pending_probes.get(&pong.from.id) {
            Some(probe) if probe.token == pong.token => {}
            Some(probe) => {
                if log::log_enabled!(log::Level::Debug) {
                    debug!(
                        "Discarding pong from {} with stale token {} (expected {})",
                        pong.from.id, pong.token, probe.token
                    );
                }
                return;
            }
            None => {
                if log::log_enabled!(log::Level::Debug) {
                    debug!("Discarding unsolicited pong from {}", pong.from.id);
                }
                return;
            }
        }

        self.pending_probes.remove(&pong.from.id);
        self.admit(pong.from);
    }

    /// Admit a verified node into its bucket.
    ///
    /// If the bucket is full, the least-recently-seen member is evicted only
    /// when it has no probe of its own in flight; a member mid-verification
    /// is never displaced, and the incoming node is dropped instead.
    fn admit(&mut self, node: Node) {
        let Some(index) = self.bucket_index(&node.id) else {
            return;
        };

        let bucket = &mut self.buckets[index];
        if let Some(position) = bucket.find_index(&node.id) {
            bucket.touch(position, node.endpoint);
            return;
        }

        if !bucket.is_full() {
            bucket.insert(node);
            return;
        }

        let Some(oldest) = bucket.least_recently_seen() else {
            return;
        };
        if self.pending_probes.contains_key(&oldest.node.id) {
            if log::log_enabled!(log::Level::Debug) {
                debug!(
                    "Bucket {} full and oldest member {} is mid-verification, dropping {}",
                    index, oldest.node.id, node.id
                );
            }
            return;
        }

        if let Some(evicted) = self.buckets[index].evict_least_recently_seen() {
            if log::log_enabled!(log::Level::Debug) {
                debug!(
                    "Evicted {} from bucket {} in favor of {}",
                    evicted.node.id, index, node.id
                );
            }
        }
        self.buckets[index].insert(node);
    }

    /// Handle a batch of candidate nodes from a neighbours response.
    ///
    /// Each candidate that is not already a member and not the local node is
    /// probed; membership follows only from the eventual pong. Bucket
    /// contents are never modified here.
    pub fn handle_neighbours(&mut self, neighbours: Neighbours) {
        for node in neighbours.nodes {
            if node.id == self.local.id {
                continue;
            }
            if self.contains(&node.id) {
                continue;
            }
            self.ping(node);
        }
    }

    /// Get up to `count` nodes closest to a target.
    ///
    /// Pure query: returns members sorted by ascending XOR distance to
    /// `target`. The sort is stable, so equally placed members keep their
    /// bucket-insertion order (distinct ids are never truly equidistant
    /// under the XOR metric).
    pub fn neighbours(&self, target: &NodeId, count: usize) -> Vec<Node> {
        let mut candidates: Vec<Node> = self
            .buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|entry| entry.node.clone()))
            .collect();

        candidates.sort_by(|a, b| compare_distance(target, &a.id, &b.id));
        candidates.truncate(count);
        candidates
    }

    /// Sweep pending probes, expiring those older than `ttl`.
    ///
    /// An expired probe is simply forgotten: a peer that never completed
    /// verification fades from pending state, while an already-admitted
    /// member surviving one missed exchange keeps its bucket slot.
    pub fn remove_expired_pongs(&mut self, now: Instant, ttl: Duration) {
        let before = self.pending_probes.len();
        self.pending_probes
            .retain(|_, probe| now.saturating_duration_since(probe.issued_at) <= ttl);

        let expired = before - self.pending_probes.len();
        if expired > 0 && log::log_enabled!(log::Level::Debug) {
            debug!("Expired {} pending probe(s)", expired);
        }
    }

    /// Check if a node is a member of the table.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.get(node_id).is_some()
    }

    /// Get a member entry by ID.
    pub fn get(&self, node_id: &NodeId) -> Option<&NodeEntry> {
        let index = self.bucket_index(node_id)?;
        self.buckets[index].get(node_id)
    }

    /// Get the pending probe for a node, if one is outstanding.
    pub fn pending_probe(&self, node_id: &NodeId) -> Option<&PendingProbe> {
        self.pending_probes.get(node_id)
    }

    /// Number of probes currently awaiting a pong.
    pub fn pending_probe_count(&self) -> usize {
        self.pending_probes.len()
    }

    /// Total number of verified peers in the table.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(KBucket::len).sum()
    }

    /// Check if the table holds no peers.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(KBucket::is_empty)
    }

    /// Get all verified peers.
    pub fn known_nodes(&self) -> Vec<Node> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|entry| entry.node.clone()))
            .collect()
    }

    /// Get per-bucket occupancy for non-empty buckets.
    pub fn bucket_stats(&self) -> Vec<(usize, usize)> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(index, bucket)| (index, bucket.len()))
            .collect()
    }

    /// Build a serializable snapshot of the current state.
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            local: self.local.clone(),
            buckets: self
                .buckets
                .iter()
                .enumerate()
                .filter(|(_, bucket)| !bucket.is_empty())
                .map(|(index, bucket)| BucketSnapshot {
                    index,
                    nodes: bucket.iter().map(|entry| entry.node.clone()).collect(),
                })
                .collect(),
            pending_probes: self.pending_probes.len(),
            discovery_round: self.discovery_round,
        }
    }
}
