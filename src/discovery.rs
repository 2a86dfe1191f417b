//! Bounded iterative discovery rounds.
//!
//! Discovery is a bootstrap activity, not continuous background churn: a
//! fixed number of rounds fire on a fixed period, each probing the union of
//! the externally supplied seed nodes (first round only) and every peer
//! currently in the routing table. Candidates learned from neighbours
//! responses between rounds enter the table through the usual ping/pong
//! verification, so each round's working set grows on the previous one.

use std::collections::HashSet;
use std::time::Duration;

use log::debug;

use crate::identity::{Node, NodeId};
use crate::routing_table::RoutingTable;

/// Number of discovery rounds before the table is frozen.
pub const MAX_DISCOVERY_ROUNDS: u32 = 7;

/// Fixed period between discovery rounds.
pub const DISCOVERY_ROUND_INTERVAL: Duration = Duration::from_secs(5);

/// Lifecycle state of the discovery process, derived from the round counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// No round has completed yet; peer queries return nothing.
    Idle,
    /// Rounds are in flight.
    Running,
    /// All rounds are spent; the table keeps answering liveness traffic but
    /// no further rounds are scheduled.
    Terminal,
}

impl DiscoveryState {
    /// Derive the state from a round counter.
    pub fn from_round(round: u32) -> Self {
        match round {
            0 => Self::Idle,
            r if r <= MAX_DISCOVERY_ROUNDS => Self::Running,
            _ => Self::Terminal,
        }
    }
}

/// Summary of one completed discovery round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    /// The round counter after completion (1-based).
    pub round: u32,
    /// Number of peers probed this round.
    pub probed: usize,
}

/// Working set of a single round: ids already queried, for dedup.
#[derive(Default)]
struct RoundState {
    queried: HashSet<NodeId>,
}

impl RoundState {
    /// Mark an id as queried; returns false if it already was.
    fn mark(&mut self, id: NodeId) -> bool {
        self.queried.insert(id)
    }
}

/// Drives the bounded discovery rounds against a routing table.
pub struct DiscoveryEngine {
    /// Seed nodes, probed on the first round only.
    bootstrap: Vec<Node>,
}

impl DiscoveryEngine {
    /// Create an engine with the given seed nodes.
    pub fn new(bootstrap: Vec<Node>) -> Self {
        Self { bootstrap }
    }

    /// Current lifecycle state for the given table.
    pub fn state(&self, table: &RoutingTable) -> DiscoveryState {
        DiscoveryState::from_round(table.discovery_round())
    }

    /// Execute one discovery round.
    ///
    /// Probes each node in the deduplicated union of the seed list (first
    /// round only) and the table's current members, then advances the round
    /// counter. Returns `None` once the round budget is spent.
    pub fn run_round(&self, table: &mut RoutingTable) -> Option<RoundReport> {
        let round = table.discovery_round();
        if round > MAX_DISCOVERY_ROUNDS {
            return None;
        }

        let mut state = RoundState::default();
        let mut targets: Vec<Node> = Vec::new();

        if round == 0 {
            for node in &self.bootstrap {
                if state.mark(node.id) {
                    targets.push(node.clone());
                }
            }
        }
        for node in table.known_nodes() {
            if state.mark(node.id) {
                targets.push(node);
            }
        }

        let probed = targets.len();
        for node in targets {
            table.ping(node);
        }
        table.advance_round();

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Discovery round {} probed {} peer(s)",
                table.discovery_round(),
                probed
            );
        }

        Some(RoundReport {
            round: table.discovery_round(),
            probed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Endpoint, NodeId};
    use crate::messages::Pong;
    use crate::routing_table::DEFAULT_BUCKET_SIZE;
    use crate::transport::mock::RecordingTransport;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    fn node(first_byte: u8, last_byte: u8) -> Node {
        let mut bytes = [0u8; 32];
        bytes[0] = first_byte;
        bytes[31] = last_byte;
        Node::new(
            NodeId::new(bytes),
            Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 2126, 2125),
        )
    }

    fn local() -> Node {
        Node::new(
            NodeId::new([0u8; 32]),
            Endpoint::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 2126, 2125),
        )
    }

    fn setup(bootstrap: Vec<Node>) -> (DiscoveryEngine, RoutingTable, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let table = RoutingTable::new(local(), &[], DEFAULT_BUCKET_SIZE, transport.clone());
        (DiscoveryEngine::new(bootstrap), table, transport)
    }

    #[test]
    fn test_state_from_round() {
        assert_eq!(DiscoveryState::from_round(0), DiscoveryState::Idle);
        assert_eq!(DiscoveryState::from_round(1), DiscoveryState::Running);
        assert_eq!(
            DiscoveryState::from_round(MAX_DISCOVERY_ROUNDS),
            DiscoveryState::Running
        );
        assert_eq!(
            DiscoveryState::from_round(MAX_DISCOVERY_ROUNDS + 1),
            DiscoveryState::Terminal
        );
    }

    #[test]
    fn test_first_round_probes_bootstrap() {
        let seed = node(0x80, 1);
        let (engine, mut table, transport) = setup(vec![seed.clone()]);

        let report = engine.run_round(&mut table).unwrap();

        assert_eq!(report.round, 1);
        assert_eq!(report.probed, 1);
        assert_eq!(transport.sent_pings().len(), 1);
        assert_eq!(transport.sent_pings()[0].0, seed);
        assert_eq!(engine.state(&table), DiscoveryState::Running);
    }

    #[test]
    fn test_later_rounds_skip_bootstrap() {
        let seed = node(0x80, 1);
        let (engine, mut table, transport) = setup(vec![seed]);

        engine.run_round(&mut table).unwrap();
        let pings_after_first = transport.sent_pings().len();

        // Table still empty, bootstrap no longer in scope: nothing to probe
        let report = engine.run_round(&mut table).unwrap();
        assert_eq!(report.round, 2);
        assert_eq!(report.probed, 0);
        assert_eq!(transport.sent_pings().len(), pings_after_first);
    }

    #[test]
    fn test_rounds_probe_current_members() {
        let seed = node(0x80, 1);
        let (engine, mut table, transport) = setup(vec![seed.clone()]);

        engine.run_round(&mut table).unwrap();
        let token = transport.last_ping_token(&seed).unwrap();
        table.handle_pong(Pong::new(seed.clone(), token));

        let report = engine.run_round(&mut table).unwrap();
        assert_eq!(report.probed, 1);
        assert_eq!(transport.sent_pings().last().unwrap().0, seed);
    }

    #[test]
    fn test_first_round_dedups_bootstrap_against_members() {
        let seed = node(0x80, 1);
        let transport = Arc::new(RecordingTransport::default());
        // Seed is already a verified member before the first round
        let mut table = RoutingTable::new(local(), &[], DEFAULT_BUCKET_SIZE, transport.clone());
        table.ping(seed.clone());
        let token = transport.last_ping_token(&seed).unwrap();
        table.handle_pong(Pong::new(seed.clone(), token));

        let engine = DiscoveryEngine::new(vec![seed]);
        let report = engine.run_round(&mut table).unwrap();
        assert_eq!(report.probed, 1);
    }

    #[test]
    fn test_round_counter_is_monotonic_and_bounded() {
        let (engine, mut table, _) = setup(vec![node(0x80, 1)]);

        let mut previous = table.discovery_round();
        while engine.run_round(&mut table).is_some() {
            let current = table.discovery_round();
            assert!(current > previous);
            previous = current;
        }

        assert_eq!(table.discovery_round(), MAX_DISCOVERY_ROUNDS + 1);
        assert_eq!(engine.state(&table), DiscoveryState::Terminal);
    }

    #[test]
    fn test_terminal_engine_is_inert() {
        let (engine, mut table, transport) = setup(Vec::new());
        while engine.run_round(&mut table).is_some() {}

        let pings_before = transport.sent_pings().len();
        assert!(engine.run_round(&mut table).is_none());
        assert_eq!(table.discovery_round(), MAX_DISCOVERY_ROUNDS + 1);
        assert_eq!(transport.sent_pings().len(), pings_before);
    }
}
