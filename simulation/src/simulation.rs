//! Lockstep multi-router simulation
//!
//! Every node of a [`Topology`] runs a [`SyncEngine`] attached to a shared
//! [`MemoryMesh`]. A round publishes on every router first and then fetches
//! and merges on every router, so reachability spreads exactly one hop per
//! round.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ndvr_core::{
    ConfigurationError, MemoryMesh, MeshFace, MeshStats, Name, RouterIdentity, SystemClock,
};
use ndvr_crypto::{CryptoError, RootAuthority, TrustAnchor, TrustVerifier};
use ndvr_logging::RouterContextGuard;
use ndvr_routing::RoutingTable;
use ndvr_sync::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_ROUND_DURATION, DEFAULT_ROUNDS, RouterConfig, SyncEngine,
    SyncError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::topology::{Topology, router};

/// Trust domain shared by every simulated router
pub const NETWORK: &str = "/ndn";

/// Engine type driven by the simulation
pub type SimEngine = SyncEngine<MeshFace, SystemClock>;

/// Configuration for a simulation
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Rounds every router runs
    pub rounds: u64,
    /// Round length handed to each router configuration
    pub round_duration: Duration,
    /// Per-peer fetch bound
    pub fetch_timeout: Duration,
    /// Probability a mesh response is dropped
    pub loss: f64,
    /// Seed for keys and loss
    pub seed: u64,
    /// Evict routes not refreshed within this many rounds
    pub stale_after_rounds: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            round_duration: DEFAULT_ROUND_DURATION,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            loss: 0.0,
            seed: 0,
            stale_after_rounds: None,
        }
    }
}

/// Errors raised while building or stepping a simulation
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid router configuration: {0}")]
    Config(#[from] ConfigurationError),

    #[error("Trust setup failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Sync engine failed: {0}")]
    Sync(#[from] SyncError),

    #[error("All {rounds} rounds have already run")]
    Finished { rounds: u64 },
}

/// Aggregated counters over all routers
#[derive(Debug, Clone, Default)]
pub struct SimStats {
    pub rounds_run: u64,
    pub publications: u64,
    pub publish_failures: u64,
    pub objects_merged: u64,
    pub routes_changed: u64,
    pub decode_errors: u64,
    pub trust_rejections: u64,
    pub stale_objects: u64,
    pub fetch_timeouts: u64,
    pub routes_evicted: u64,
    /// Substrate counters
    pub mesh: MeshStats,
    /// First round after which every table matched the topology
    pub converged_at: Option<u64>,
}

/// What one lockstep round did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: u64,
    pub routes_changed: usize,
    pub converged: bool,
}

/// The simulation state
pub struct Simulation {
    topology: Topology,
    mesh: MemoryMesh,
    anchor: TrustAnchor,
    engines: BTreeMap<usize, SimEngine>,
    /// Logging instance id of each router, fixed for the whole run
    instance_ids: BTreeMap<usize, Uuid>,
    config: SimConfig,
    round: u64,
    /// Statistics
    pub stats: SimStats,
}

impl Simulation {
    /// Start one router per topology node, all trusting a seeded root
    pub fn new(topology: Topology, config: SimConfig) -> Result<Self, SimError> {
        let network = Name::parse(NETWORK).map_err(ConfigurationError::from)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let root = RootAuthority::from_seed(network.clone(), rng.random())?;
        let mesh = MemoryMesh::with_loss(config.loss, config.seed);

        let mut engines = BTreeMap::new();
        let mut instance_ids = BTreeMap::new();
        for node in topology.nodes() {
            let identity = router(node);
            let mut router_config = RouterConfig::new(network.clone(), identity.clone())
                .with_rounds(config.rounds)
                .with_round_duration(config.round_duration)
                .with_fetch_timeout(config.fetch_timeout);
            router_config.stale_after_rounds = config.stale_after_rounds;
            router_config.validate()?;

            let signing = root.issue_with_seed(&identity, rng.random())?;
            let face = mesh.attach(identity);
            let engine = SyncEngine::new(
                router_config,
                signing,
                TrustVerifier::new(root.anchor().clone()),
                Arc::new(face),
                Arc::new(SystemClock),
            );
            engines.insert(node, engine);
            instance_ids.insert(node, uuid::Builder::from_random_bytes(rng.random()).into_uuid());
        }
        topology.wire(&mesh);

        debug!(
            routers = engines.len(),
            links = topology.edge_count(),
            "Simulation ready"
        );
        Ok(Self {
            topology,
            mesh,
            anchor: root.anchor().clone(),
            engines,
            instance_ids,
            config,
            round: 0,
            stats: SimStats::default(),
        })
    }

    /// Run one lockstep round
    pub async fn step_round(&mut self) -> Result<RoundSummary, SimError> {
        if self.round >= self.config.rounds {
            return Err(SimError::Finished {
                rounds: self.config.rounds,
            });
        }
        self.round += 1;
        let round = self.round;

        for (node, engine) in self.engines.iter_mut() {
            let span = router_span(engine.identity(), self.instance_ids[node]);
            match engine.publish().instrument(span).await {
                Ok(_) => {}
                Err(e @ (SyncError::Stopped | SyncError::InvalidTransition { .. })) => {
                    return Err(e.into());
                }
                Err(e) => warn!(round, router = %engine.identity(), error = %e, "Publish failed"),
            }
        }

        let mut routes_changed = 0;
        for (node, engine) in self.engines.iter_mut() {
            let span = router_span(engine.identity(), self.instance_ids[node]);
            let outcome = engine.fetch_and_merge().instrument(span).await?;
            routes_changed += outcome.changed.len();
        }

        if round == self.config.rounds {
            for engine in self.engines.values_mut() {
                engine.stop();
            }
        }

        self.refresh_stats();
        let converged = self.converged();
        if converged && self.stats.converged_at.is_none() {
            self.stats.converged_at = Some(round);
        }
        info!(round, routes_changed, converged, "Simulation round complete");

        Ok(RoundSummary {
            round,
            routes_changed,
            converged,
        })
    }

    /// Run every remaining round
    pub async fn run(&mut self) -> Result<&SimStats, SimError> {
        while self.round < self.config.rounds {
            self.step_round().await?;
        }
        Ok(&self.stats)
    }

    /// Check every table against the topology
    ///
    /// Each router must hold exactly the nodes reachable from it, each at
    /// its hop-count distance.
    pub fn converged(&self) -> bool {
        self.engines.iter().all(|(&node, engine)| {
            let expected = self.topology.hop_distances(node);
            let table = engine.table();
            table.len() == expected.len()
                && expected.iter().all(|(&dest, &cost)| {
                    table
                        .get(&router(dest))
                        .is_some_and(|entry| entry.cost == cost)
                })
        })
    }

    /// Cut a link in both the topology and the mesh
    pub fn fail_link(&mut self, a: usize, b: usize) {
        info!(a, b, round = self.round, "Link down");
        self.topology.disconnect(a, b);
        self.mesh.disconnect(&router(a), &router(b));
    }

    /// Restore a link in both the topology and the mesh
    pub fn restore_link(&mut self, a: usize, b: usize) {
        info!(a, b, round = self.round, "Link up");
        self.topology.connect(a, b);
        self.mesh.connect(&router(a), &router(b));
    }

    /// Engine running on a node
    pub fn engine(&self, node: usize) -> Option<&SimEngine> {
        self.engines.get(&node)
    }

    /// Instance id a node's log events carry
    pub fn instance_id(&self, node: usize) -> Option<Uuid> {
        self.instance_ids.get(&node).copied()
    }

    /// Routing table of a node
    pub fn table(&self, node: usize) -> Option<&RoutingTable> {
        self.engine(node).map(SyncEngine::table)
    }

    /// Rounds run so far
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn mesh(&self) -> &MemoryMesh {
        &self.mesh
    }

    /// Anchor every router trusts
    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Render one router's table
    pub fn describe_table(&self, node: usize) -> String {
        let Some(table) = self.table(node) else {
            return format!("Router{node}: not simulated\n");
        };
        let mut output = format!("{} ({} destinations)\n", table.owner(), table.len());
        for entry in table.entries() {
            output.push_str(&format!(
                "  {:<12} via {:<12} cost {:>3}  seq {:>3}  round {:>3}\n",
                entry.destination.short_id(),
                entry
                    .next_hop
                    .neighbor()
                    .map_or_else(|| "local".to_string(), RouterIdentity::short_id),
                entry.cost,
                entry.sequence,
                entry.round,
            ));
        }
        output
    }

    /// One-line state summary
    pub fn state_summary(&self) -> String {
        let routes: usize = self.engines.values().map(|e| e.table().len()).sum();
        format!(
            "Round {}/{}: {} routers, {} routes, {} merged, {} rejected, converged: {}",
            self.round,
            self.config.rounds,
            self.engines.len(),
            routes,
            self.stats.objects_merged,
            self.stats.trust_rejections,
            self.stats
                .converged_at
                .map_or_else(|| "no".to_string(), |r| format!("round {r}")),
        )
    }

    fn refresh_stats(&mut self) {
        let mut stats = SimStats {
            rounds_run: self.round,
            mesh: self.mesh.stats(),
            converged_at: self.stats.converged_at,
            ..SimStats::default()
        };
        for engine in self.engines.values() {
            let s = engine.stats();
            stats.publications += s.publications;
            stats.publish_failures += s.publish_failures;
            stats.objects_merged += s.objects_merged;
            stats.routes_changed += s.routes_changed;
            stats.decode_errors += s.decode_errors;
            stats.trust_rejections += s.trust_rejections;
            stats.stale_objects += s.stale_objects;
            stats.fetch_timeouts += s.fetch_timeouts;
            stats.routes_evicted += s.routes_evicted;
        }
        self.stats = stats;
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("routers", &self.engines.len())
            .field("round", &self.round)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Span for one router's work, stamped with its context
fn router_span(identity: &RouterIdentity, instance_id: Uuid) -> Span {
    let _context = RouterContextGuard::with_instance_id(identity, instance_id);
    info_span!("router", id = %identity)
}
