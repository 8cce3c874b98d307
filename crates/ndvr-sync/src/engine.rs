//! Round-based routing sync engine
//!
//! A [`SyncEngine`] drives one router through its rounds. Each round it
//! publishes its table as a signed object, then fetches the newest object of
//! every neighbour it knows of, verifies them and merges them in ascending
//! origin order.
//!
//! ```text
//!   Idle -> Publishing -> Fetching -> Merging -> Idle
//!     \__________\____________\__________\____> Stopped
//! ```
//!
//! Malformed or untrusted objects are counted in [`SyncStats`] and dropped.
//! They never fail a round.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::sync::Arc;

use ndvr_core::{
    Clock, DecodedObject, EncodeError, FetchError, ForwardingSubstrate, Name, NameCodec,
    RouterIdentity, SubstrateError,
};
use ndvr_crypto::{CryptoError, SignedRoutingObject, SigningContext, TrustVerifier, Verdict};
use ndvr_routing::RoutingTable;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use crate::config::RouterConfig;

/// Lifecycle state of a [`SyncEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SyncState {
    /// Between rounds
    Idle,
    /// Own object published, waiting for the fetch phase
    Publishing,
    /// Fetching neighbour objects
    Fetching,
    /// Merging verified objects into the table
    Merging,
    /// Terminal; the table stays readable
    Stopped,
}

impl Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Publishing => "publishing",
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Errors returned by engine operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Engine is stopped")]
    Stopped,

    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        state: SyncState,
        operation: &'static str,
    },

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Substrate error: {0}")]
    Substrate(#[from] SubstrateError),

    #[error("Signing failed: {0}")]
    Crypto(#[from] CryptoError),
}

/// Counters describing what an engine has done
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Rounds fully completed
    pub rounds_completed: u64,
    /// Objects advertised
    pub publications: u64,
    /// Advertisements the substrate refused
    pub publish_failures: u64,
    /// Objects received from the substrate
    pub objects_fetched: u64,
    /// Objects verified and merged
    pub objects_merged: u64,
    /// Destinations changed by merges
    pub routes_changed: u64,
    /// Objects that failed wire or name decoding
    pub decode_errors: u64,
    /// Objects rejected by the trust verifier
    pub trust_rejections: u64,
    /// Fetches that ran into their timeout
    pub fetch_timeouts: u64,
    /// Fetches or discoveries the substrate could not serve
    pub fetch_failures: u64,
    /// Objects not newer than the last one merged from their origin
    pub stale_objects: u64,
    /// Routes evicted for not being refreshed
    pub routes_evicted: u64,
}

/// Result of one fetch-and-merge phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Origins whose objects were merged, ascending
    pub merged_from: Vec<RouterIdentity>,
    /// Destinations whose entry changed
    pub changed: BTreeSet<RouterIdentity>,
}

/// Per-router sync state machine
pub struct SyncEngine<S, C> {
    config: RouterConfig,
    codec: NameCodec,
    table: RoutingTable,
    signing: SigningContext,
    verifier: TrustVerifier,
    substrate: Arc<S>,
    clock: Arc<C>,
    state: SyncState,
    /// Round currently in progress, or the last one completed
    round: u64,
    /// Neighbours seen in earlier rounds
    known_peers: BTreeSet<RouterIdentity>,
    /// Highest sequence merged per origin
    last_merged: BTreeMap<RouterIdentity, u64>,
    dirty: bool,
    stats: SyncStats,
}

impl<S, C> SyncEngine<S, C>
where
    S: ForwardingSubstrate + 'static,
    C: Clock,
{
    /// Create an engine in the `Idle` state
    ///
    /// The configuration is assumed validated.
    pub fn new(
        config: RouterConfig,
        signing: SigningContext,
        verifier: TrustVerifier,
        substrate: Arc<S>,
        clock: Arc<C>,
    ) -> Self {
        let codec = NameCodec::with_marker(&config.network, &config.sync_marker);
        let table = RoutingTable::new(config.identity.clone());
        Self {
            config,
            codec,
            table,
            signing,
            verifier,
            substrate,
            clock,
            state: SyncState::Idle,
            round: 0,
            known_peers: BTreeSet::new(),
            last_merged: BTreeMap::new(),
            dirty: false,
            stats: SyncStats::default(),
        }
    }

    /// Publish the table for the next round
    ///
    /// Moves `Idle` to `Publishing`. The state also advances when the
    /// substrate refuses the object, so the round can still fetch.
    pub async fn publish(&mut self) -> Result<Name, SyncError> {
        self.expect_state(SyncState::Idle, "publish")?;
        self.state = SyncState::Publishing;
        self.round += 1;

        let round = self.round;
        let sequence = self.table.bump_own_sequence(round);
        let (name, content) =
            self.codec
                .encode(self.table.owner(), self.table.entries(), sequence)?;
        let object =
            SignedRoutingObject::build(name.clone(), content, self.config.freshness, &self.signing)?;
        let wire = object.to_bytes()?;

        if let Err(e) = self.substrate.advertise(name.clone(), wire).await {
            self.stats.publish_failures += 1;
            warn!(round, name = %name, error = %e, "Advertise failed");
            return Err(e.into());
        }

        self.stats.publications += 1;
        self.dirty = false;
        debug!(round, sequence, name = %name, entries = self.table.len(), "Published routing object");
        Ok(name)
    }

    /// Fetch neighbour objects and merge them
    ///
    /// Moves `Publishing` through `Fetching` and `Merging` back to `Idle`,
    /// completing the round.
    pub async fn fetch_and_merge(&mut self) -> Result<MergeOutcome, SyncError> {
        self.expect_state(SyncState::Publishing, "fetch")?;
        self.state = SyncState::Fetching;

        let peers = self.discover_peers().await;
        let fetched = self.fetch_all(peers).await;

        self.state = SyncState::Merging;
        let outcome = self.merge_fetched(fetched);

        if let Some(max_age) = self.config.stale_after_rounds {
            let evicted = self.table.prune_stale(self.round, max_age);
            if !evicted.is_empty() {
                self.stats.routes_evicted += evicted.len() as u64;
                self.dirty = true;
            }
        }

        self.state = SyncState::Idle;
        self.stats.rounds_completed += 1;
        Ok(outcome)
    }

    /// Run one full round, stopping after the last configured one
    pub async fn run_round(&mut self) -> Result<MergeOutcome, SyncError> {
        match self.publish().await {
            Ok(_) => {}
            Err(e @ (SyncError::Stopped | SyncError::InvalidTransition { .. })) => return Err(e),
            Err(e) => debug!(round = self.round, error = %e, "Publish failed, round continues"),
        }
        let outcome = self.fetch_and_merge().await?;

        info!(
            round = self.round,
            merged = outcome.merged_from.len(),
            changed = outcome.changed.len(),
            destinations = self.table.len(),
            "Round complete"
        );

        if self.stats.rounds_completed >= self.config.rounds {
            self.stop();
        }
        Ok(outcome)
    }

    /// Stop the engine for good
    pub fn stop(&mut self) {
        if self.state != SyncState::Stopped {
            info!(rounds = self.stats.rounds_completed, "Sync engine stopped");
            self.state = SyncState::Stopped;
        }
    }

    /// Current state
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Whether the table changed since the last publication
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Current or last completed round number
    pub fn round(&self) -> u64 {
        self.round
    }

    /// This router's identity
    pub fn identity(&self) -> &RouterIdentity {
        self.table.owner()
    }

    /// Routing table
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Counters
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Name codec in use
    pub fn codec(&self) -> &NameCodec {
        &self.codec
    }

    /// Neighbours seen so far
    pub fn known_peers(&self) -> &BTreeSet<RouterIdentity> {
        &self.known_peers
    }

    fn expect_state(&self, expected: SyncState, operation: &'static str) -> Result<(), SyncError> {
        if self.state == SyncState::Stopped {
            return Err(SyncError::Stopped);
        }
        if self.state != expected {
            return Err(SyncError::InvalidTransition {
                state: self.state,
                operation,
            });
        }
        Ok(())
    }

    /// Known peers plus whoever answers a discovery flood
    async fn discover_peers(&mut self) -> BTreeSet<RouterIdentity> {
        let prefix = self.codec.sync_prefix().clone();
        match self
            .substrate
            .discover(&prefix, self.config.fetch_timeout)
            .await
        {
            Ok(names) => {
                for name in names {
                    match self.codec.parse_name(&name) {
                        Ok((origin, _)) if &origin != self.table.owner() => {
                            if self.known_peers.insert(origin.clone()) {
                                debug!(peer = %origin, "Discovered neighbour");
                            }
                        }
                        Ok(_) => {}
                        Err(e) => trace!(name = %name, error = %e, "Ignoring discovered name"),
                    }
                }
            }
            Err(e) => {
                self.stats.fetch_failures += 1;
                debug!(error = %e, "Discovery failed");
            }
        }
        self.known_peers.clone()
    }

    /// Fetch the newest object of each peer concurrently
    async fn fetch_all(
        &mut self,
        peers: BTreeSet<RouterIdentity>,
    ) -> BTreeMap<RouterIdentity, Vec<u8>> {
        let timeout = self.config.fetch_timeout;
        let mut tasks = JoinSet::new();
        for peer in peers {
            let prefix = self.codec.object_prefix(&peer);
            let substrate = Arc::clone(&self.substrate);
            tasks.spawn(async move {
                let result = tokio::time::timeout(timeout, substrate.fetch(&prefix, timeout))
                    .await
                    .unwrap_or_else(|_| {
                        Err(FetchError::Timeout {
                            name: prefix.clone(),
                            timeout,
                        })
                    });
                (peer, result)
            });
        }

        let mut fetched = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((peer, Ok(bytes))) => {
                    self.stats.objects_fetched += 1;
                    fetched.insert(peer, bytes);
                }
                Ok((peer, Err(FetchError::Timeout { .. }))) => {
                    self.stats.fetch_timeouts += 1;
                    debug!(peer = %peer, ?timeout, "Fetch timed out");
                }
                Ok((peer, Err(e))) => {
                    self.stats.fetch_failures += 1;
                    debug!(peer = %peer, error = %e, "Fetch failed");
                }
                Err(e) => {
                    self.stats.fetch_failures += 1;
                    warn!(error = %e, "Fetch task failed");
                }
            }
        }
        fetched
    }

    /// Verify, decode and merge fetched objects in ascending origin order
    fn merge_fetched(&mut self, fetched: BTreeMap<RouterIdentity, Vec<u8>>) -> MergeOutcome {
        let mut accepted = BTreeMap::new();
        for (peer, bytes) in fetched {
            if let Some(decoded) = self.accept(&peer, &bytes) {
                accepted.insert(decoded.origin.clone(), decoded);
            }
        }

        let mut outcome = MergeOutcome::default();
        for (origin, decoded) in accepted {
            match self.table.merge(&origin, decoded.entries.values(), self.round) {
                Ok(changed) => {
                    self.last_merged.insert(origin.clone(), decoded.sequence);
                    self.stats.objects_merged += 1;
                    self.stats.routes_changed += changed.len() as u64;
                    if !changed.is_empty() {
                        self.dirty = true;
                    }
                    outcome.changed.extend(changed);
                    outcome.merged_from.push(origin);
                }
                Err(e) => {
                    self.stats.decode_errors += 1;
                    warn!(origin = %origin, error = %e, "Merge refused");
                }
            }
        }
        outcome
    }

    /// Run one fetched object through decoding and verification
    fn accept(&mut self, peer: &RouterIdentity, bytes: &[u8]) -> Option<DecodedObject> {
        let object = match SignedRoutingObject::from_bytes(bytes) {
            Ok(object) => object,
            Err(e) => {
                self.stats.decode_errors += 1;
                debug!(peer = %peer, error = %e, "Undecodable object");
                return None;
            }
        };

        let (origin, sequence) = match self.codec.parse_name(&object.name) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.stats.decode_errors += 1;
                debug!(peer = %peer, name = %object.name, error = %e, "Unexpected object name");
                return None;
            }
        };
        if &origin == self.table.owner() {
            return None;
        }

        match object.verify(&self.verifier, &origin, self.clock.now_utc()) {
            Verdict::Accepted => {}
            verdict => {
                self.stats.trust_rejections += 1;
                warn!(origin = %origin, name = %object.name, ?verdict, "Rejected routing object");
                return None;
            }
        }

        if self
            .last_merged
            .get(&origin)
            .is_some_and(|&last| sequence <= last)
        {
            self.stats.stale_objects += 1;
            trace!(origin = %origin, sequence, "Stale object");
            return None;
        }

        match self.codec.decode(&object.name, &object.content) {
            Ok(decoded) => {
                debug!(
                    origin = %origin,
                    sequence,
                    entries = decoded.entries.len(),
                    skipped = decoded.skipped_records,
                    "Accepted routing object"
                );
                Some(decoded)
            }
            Err(e) => {
                self.stats.decode_errors += 1;
                debug!(origin = %origin, error = %e, "Malformed routing payload");
                None
            }
        }
    }
}

impl<S, C> std::fmt::Debug for SyncEngine<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("identity", self.table.owner())
            .field("state", &self.state)
            .field("round", &self.round)
            .field("destinations", &self.table.len())
            .finish_non_exhaustive()
    }
}
