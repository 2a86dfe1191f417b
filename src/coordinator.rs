//! Discovery coordinator: single owner of the routing table.
//!
//! Every mutation of discovery state (network events, operator commands and
//! timer fires alike) is funneled through one mailbox and applied by one
//! task, so no two mutations ever race and no lock guards the table. Network
//! sends are fire-and-forget; responses come back later as ordinary inbound
//! events. Two timers feed the same mailbox: a bounded discovery-round timer
//! and an unbounded cleanup timer that expires stale probes for the life of
//! the process.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant as TokioInstant};

use crate::config::DiscoveryConfig;
use crate::discovery::{DiscoveryEngine, DISCOVERY_ROUND_INTERVAL, MAX_DISCOVERY_ROUNDS};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::identity::{Node, NodeId};
use crate::messages::{Neighbours, Ping, Pong};
use crate::routing_table::{RoutingTable, TableSnapshot};
use crate::transport::{ConnectionObserver, DiscoveryNotification, Transport};

/// Period of the cleanup sweep.
pub const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(10);

/// TTL for pending probes: a probe outstanding for longer than one cleanup
/// interval is considered unanswered.
pub const PENDING_PROBE_TTL: std::time::Duration = CLEANUP_INTERVAL;

/// Events processed by the coordinator, one at a time.
enum Event {
    /// Mark a node as freshly seen.
    RefreshNode(Node),
    /// Issue a liveness probe.
    Ping(Node),
    /// A decoded ping arrived from the network.
    PingReceived(Ping),
    /// A decoded pong arrived from the network.
    PongReceived(Pong),
    /// A decoded neighbours batch arrived from the network.
    NeighboursReceived(Neighbours),
    /// Toggle the pong kill-switch.
    SetIgnorePongs(bool),
    /// Discovery-round timer fired.
    DiscoveryTick,
    /// Cleanup timer fired.
    CleanupTick,
    /// Read-only query answered from current state.
    Query(Query),
}

/// Read-only queries; replies carry the latest committed state.
enum Query {
    RoutingTable(oneshot::Sender<TableSnapshot>),
    Neighbours {
        target: NodeId,
        count: usize,
        reply: oneshot::Sender<Vec<Node>>,
    },
    Peers(oneshot::Sender<Vec<Node>>),
}

/// Single-threaded owner of discovery state.
pub struct Coordinator {
    table: RoutingTable,
    engine: DiscoveryEngine,
    observer: Arc<dyn ConnectionObserver>,
    /// When set, every incoming pong is dropped before reaching the table.
    ignore_pongs: bool,
}

impl Coordinator {
    /// Create a coordinator; bootstrap nodes are probed immediately.
    pub fn new(
        local: Node,
        bootstrap_nodes: Vec<Node>,
        bucket_size: usize,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Self {
        let table = RoutingTable::new(local, &bootstrap_nodes, bucket_size, transport);
        Self {
            table,
            engine: DiscoveryEngine::new(bootstrap_nodes),
            observer,
            ignore_pongs: false,
        }
    }

    /// Build a coordinator from configuration and start it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: &DiscoveryConfig,
        local: Node,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn ConnectionObserver>,
    ) -> DiscoveryResult<DiscoveryHandle> {
        let bootstrap_nodes = config.parse_bootstrap_nodes()?;
        let coordinator = Self::new(
            local,
            bootstrap_nodes,
            config.bucket_size,
            transport,
            observer,
        );
        Ok(coordinator.start())
    }

    /// Start the event loop and timers, returning a handle to them.
    ///
    /// The loop exits once every handle has been dropped. Must be called
    /// from within a tokio runtime.
    pub fn start(self) -> DiscoveryHandle {
        let (events, mut mailbox) = mpsc::unbounded_channel();

        // Discovery-round timer: a bounded number of firings, then done.
        let timer_events = events.clone();
        tokio::spawn(async move {
            let start = TokioInstant::now() + DISCOVERY_ROUND_INTERVAL;
            let mut timer = interval_at(start, DISCOVERY_ROUND_INTERVAL);
            for _ in 0..=MAX_DISCOVERY_ROUNDS {
                timer.tick().await;
                if timer_events.send(Event::DiscoveryTick).is_err() {
                    return;
                }
            }
        });

        // Cleanup timer: re-arms unconditionally for the life of the process.
        let timer_events = events.clone();
        tokio::spawn(async move {
            let start = TokioInstant::now() + CLEANUP_INTERVAL;
            let mut timer = interval_at(start, CLEANUP_INTERVAL);
            loop {
                timer.tick().await;
                if timer_events.send(Event::CleanupTick).is_err() {
                    return;
                }
            }
        });

        let mut coordinator = self;
        tokio::spawn(async move {
            if log::log_enabled!(log::Level::Info) {
                info!(
                    "Discovery coordinator started (local node: {})",
                    coordinator.table.local().id
                );
            }
            while let Some(event) = mailbox.recv().await {
                coordinator.handle_event(event);
            }
            if log::log_enabled!(log::Level::Debug) {
                debug!("Discovery mailbox closed, coordinator exiting");
            }
        });

        DiscoveryHandle { events }
    }

    /// Apply a single event to the owned state.
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::RefreshNode(node) => self.table.refresh_node(node),
            Event::Ping(node) => self.table.ping(node),
            Event::PingReceived(ping) => self.table.handle_ping(ping),
            Event::PongReceived(pong) => {
                if self.ignore_pongs {
                    if log::log_enabled!(log::Level::Debug) {
                        debug!("Ignoring pong from {} (kill-switch engaged)", pong.from.id);
                    }
                } else {
                    self.table.handle_pong(pong);
                }
            }
            Event::NeighboursReceived(neighbours) => self.table.handle_neighbours(neighbours),
            Event::SetIgnorePongs(flag) => {
                if log::log_enabled!(log::Level::Info) {
                    info!("Pong handling {}", if flag { "disabled" } else { "enabled" });
                }
                self.ignore_pongs = flag;
            }
            Event::DiscoveryTick => {
                if let Some(report) = self.engine.run_round(&mut self.table) {
                    self.observer.notify(DiscoveryNotification::RoundCompleted {
                        round: report.round,
                        known_peers: self.table.len(),
                    });
                }
            }
            Event::CleanupTick => {
                self.table
                    .remove_expired_pongs(Instant::now(), PENDING_PROBE_TTL);
            }
            Event::Query(query) => self.answer(query),
        }
    }

    /// Answer a read-only query from current state.
    fn answer(&self, query: Query) {
        match query {
            Query::RoutingTable(reply) => {
                let _ = reply.send(self.table.snapshot());
            }
            Query::Neighbours {
                target,
                count,
                reply,
            } => {
                let _ = reply.send(self.table.neighbours(&target, count));
            }
            Query::Peers(reply) => {
                // Nothing is reported before the first round has completed
                let peers = if self.table.discovery_round() == 0 {
                    Vec::new()
                } else {
                    self.table.known_nodes()
                };
                let _ = reply.send(peers);
            }
        }
    }
}

/// Handle to a running coordinator.
///
/// Cloneable; the coordinator exits when every handle has been dropped.
#[derive(Clone)]
pub struct DiscoveryHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl DiscoveryHandle {
    fn send(&self, event: Event) -> DiscoveryResult<()> {
        self.events
            .send(event)
            .map_err(|_| DiscoveryError::CoordinatorClosed)
    }

    /// Mark a node as freshly seen.
    pub fn refresh_node(&self, node: Node) -> DiscoveryResult<()> {
        self.send(Event::RefreshNode(node))
    }

    /// Issue a liveness probe to a node.
    pub fn ping(&self, node: Node) -> DiscoveryResult<()> {
        self.send(Event::Ping(node))
    }

    /// Deliver a decoded ping from the network.
    pub fn ping_received(&self, ping: Ping) -> DiscoveryResult<()> {
        self.send(Event::PingReceived(ping))
    }

    /// Deliver a decoded pong from the network.
    pub fn pong_received(&self, pong: Pong) -> DiscoveryResult<()> {
        self.send(Event::PongReceived(pong))
    }

    /// Deliver a decoded neighbours batch from the network.
    pub fn neighbours_received(&self, neighbours: Neighbours) -> DiscoveryResult<()> {
        self.send(Event::NeighboursReceived(neighbours))
    }

    /// Engage or release the pong kill-switch.
    pub fn set_ignore_pongs(&self, flag: bool) -> DiscoveryResult<()> {
        self.send(Event::SetIgnorePongs(flag))
    }

    /// Snapshot the current routing table.
    pub async fn routing_table(&self) -> DiscoveryResult<TableSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Event::Query(Query::RoutingTable(reply)))?;
        rx.await.map_err(|_| DiscoveryError::CoordinatorClosed)
    }

    /// Get up to `count` known peers closest to `target`.
    pub async fn neighbours(&self, target: NodeId, count: usize) -> DiscoveryResult<Vec<Node>> {
        let (reply, rx) = oneshot::channel();
        self.send(Event::Query(Query::Neighbours {
            target,
            count,
            reply,
        }))?;
        rx.await.map_err(|_| DiscoveryError::CoordinatorClosed)
    }

    /// Get every discovered peer.
    ///
    /// Returns the empty set until the first discovery round has completed.
    pub async fn get_peers(&self) -> DiscoveryResult<Vec<Node>> {
        let (reply, rx) = oneshot::channel();
        self.send(Event::Query(Query::Peers(reply)))?;
        rx.await.map_err(|_| DiscoveryError::CoordinatorClosed)
    }
}
