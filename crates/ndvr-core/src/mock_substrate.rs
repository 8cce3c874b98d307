//! In-memory forwarding substrate
//!
//! [`MemoryMesh`] models a one-hop broadcast medium: each attached router
//! gets a [`MeshFace`], objects it advertises land in its own content
//! store, and fetch/discovery requests are answered only by routers it is
//! currently linked to. Links can be cut and restored to model churn, and
//! a seeded loss probability drops individual responses.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ndvr_core::{MemoryMesh, RouterIdentity, ForwardingSubstrate};
//!
//! let mesh = MemoryMesh::new();
//! let a = RouterIdentity::from_ordinal(0);
//! let b = RouterIdentity::from_ordinal(1);
//! let face_a = mesh.attach(a.clone());
//! let face_b = mesh.attach(b.clone());
//! mesh.connect(&a, &b);
//!
//! face_a.advertise(name.clone(), payload).await?;
//! let data = face_b.fetch(&name, timeout).await?;
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::error::{FetchError, SubstrateError};
use crate::identity::RouterIdentity;
use crate::name::Name;
use crate::traits::ForwardingSubstrate;

/// Default number of objects each content store retains
pub const DEFAULT_STORE_CAPACITY: usize = 1000;

/// Counters kept by a [`MemoryMesh`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub advertised: u64,
    pub fetch_hits: u64,
    pub fetch_misses: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    advertised: AtomicU64,
    fetch_hits: AtomicU64,
    fetch_misses: AtomicU64,
    dropped: AtomicU64,
}

struct MeshState {
    stores: DashMap<RouterIdentity, VecDeque<(Name, Vec<u8>)>>,
    links: DashMap<RouterIdentity, BTreeSet<RouterIdentity>>,
    store_capacity: usize,
    loss_probability: Mutex<f64>,
    rng: Mutex<StdRng>,
    counters: Counters,
}

impl MeshState {
    fn lost(&self) -> bool {
        let p = *self.loss_probability.lock();
        if p <= 0.0 {
            return false;
        }
        let lost = self.rng.lock().random::<f64>() < p;
        if lost {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
        lost
    }

    fn neighbors(&self, id: &RouterIdentity) -> Vec<RouterIdentity> {
        self.links
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Newest object held by `owner` whose name has `prefix` as a prefix
    fn newest_under(&self, owner: &RouterIdentity, prefix: &Name) -> Option<(Name, Vec<u8>)> {
        let store = self.stores.get(owner)?;
        store
            .iter()
            .rev()
            .find(|(name, _)| prefix.is_prefix_of(name))
            .cloned()
    }
}

/// Shared in-memory broadcast medium
#[derive(Clone)]
pub struct MemoryMesh {
    state: Arc<MeshState>,
}

impl Default for MemoryMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMesh {
    /// Create a lossless mesh
    pub fn new() -> Self {
        Self::with_loss(0.0, 0)
    }

    /// Create a mesh dropping each response with probability `loss`
    pub fn with_loss(loss: f64, seed: u64) -> Self {
        Self {
            state: Arc::new(MeshState {
                stores: DashMap::new(),
                links: DashMap::new(),
                store_capacity: DEFAULT_STORE_CAPACITY,
                loss_probability: Mutex::new(loss.clamp(0.0, 1.0)),
                rng: Mutex::new(StdRng::seed_from_u64(seed)),
                counters: Counters::default(),
            }),
        }
    }

    /// Attach a router and return its face
    pub fn attach(&self, id: RouterIdentity) -> MeshFace {
        self.state.stores.entry(id.clone()).or_default();
        self.state.links.entry(id.clone()).or_default();
        MeshFace {
            id,
            state: Arc::clone(&self.state),
        }
    }

    /// Add a bidirectional link
    pub fn connect(&self, a: &RouterIdentity, b: &RouterIdentity) {
        if a == b {
            return;
        }
        self.state.links.entry(a.clone()).or_default().insert(b.clone());
        self.state.links.entry(b.clone()).or_default().insert(a.clone());
    }

    /// Remove a bidirectional link
    pub fn disconnect(&self, a: &RouterIdentity, b: &RouterIdentity) {
        if let Some(mut set) = self.state.links.get_mut(a) {
            set.remove(b);
        }
        if let Some(mut set) = self.state.links.get_mut(b) {
            set.remove(a);
        }
    }

    /// Cut every link of a router
    pub fn isolate(&self, id: &RouterIdentity) {
        for neighbor in self.state.neighbors(id) {
            self.disconnect(id, &neighbor);
        }
    }

    /// Current neighbours of a router, in ascending order
    pub fn neighbors(&self, id: &RouterIdentity) -> Vec<RouterIdentity> {
        self.state.neighbors(id)
    }

    /// Change the response loss probability
    pub fn set_loss_probability(&self, loss: f64) {
        *self.state.loss_probability.lock() = loss.clamp(0.0, 1.0);
    }

    /// Place an object directly into a router's content store
    ///
    /// Lets tests stand in for a router that does not run the protocol.
    pub fn inject(&self, owner: &RouterIdentity, name: Name, payload: Vec<u8>) {
        store_object(&self.state, owner, name, payload);
    }

    /// Snapshot of the mesh counters
    pub fn stats(&self) -> MeshStats {
        let c = &self.state.counters;
        MeshStats {
            advertised: c.advertised.load(Ordering::Relaxed),
            fetch_hits: c.fetch_hits.load(Ordering::Relaxed),
            fetch_misses: c.fetch_misses.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
        }
    }
}

fn store_object(state: &MeshState, owner: &RouterIdentity, name: Name, payload: Vec<u8>) {
    let mut store = state.stores.entry(owner.clone()).or_default();
    store.retain(|(existing, _)| existing != &name);
    store.push_back((name, payload));
    while store.len() > state.store_capacity {
        store.pop_front();
    }
    state.counters.advertised.fetch_add(1, Ordering::Relaxed);
}

/// One router's attachment to a [`MemoryMesh`]
///
/// Fetches that find nothing fail with [`FetchError::Timeout`] immediately
/// rather than waiting out the timeout.
#[derive(Clone)]
pub struct MeshFace {
    id: RouterIdentity,
    state: Arc<MeshState>,
}

impl MeshFace {
    /// Identity of the attached router
    pub fn id(&self) -> &RouterIdentity {
        &self.id
    }
}

#[async_trait]
impl ForwardingSubstrate for MeshFace {
    async fn advertise(&self, name: Name, payload: Vec<u8>) -> Result<(), SubstrateError> {
        if !self.state.stores.contains_key(&self.id) {
            return Err(SubstrateError::UnknownFace(self.id.to_string()));
        }
        trace!(face = %self.id, name = %name, "Advertise");
        store_object(&self.state, &self.id, name, payload);
        Ok(())
    }

    async fn fetch(&self, name: &Name, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        for neighbor in self.state.neighbors(&self.id) {
            if let Some((_, payload)) = self.state.newest_under(&neighbor, name) {
                if self.state.lost() {
                    trace!(face = %self.id, from = %neighbor, name = %name, "Response lost");
                    continue;
                }
                self.state.counters.fetch_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(payload);
            }
        }
        self.state.counters.fetch_misses.fetch_add(1, Ordering::Relaxed);
        Err(FetchError::Timeout {
            name: name.clone(),
            timeout,
        })
    }

    async fn discover(&self, prefix: &Name, _timeout: Duration) -> Result<Vec<Name>, FetchError> {
        let mut names = Vec::new();
        for neighbor in self.state.neighbors(&self.id) {
            if let Some((name, _)) = self.state.newest_under(&neighbor, prefix) {
                if self.state.lost() {
                    continue;
                }
                names.push(name);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> RouterIdentity {
        RouterIdentity::from_ordinal(n)
    }

    fn name(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    const T: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_fetch_from_neighbor() {
        let mesh = MemoryMesh::new();
        let a = mesh.attach(id(0));
        let b = mesh.attach(id(1));
        mesh.connect(&id(0), &id(1));

        a.advertise(name("/ndn/s/a/1"), b"one".to_vec()).await.unwrap();
        assert_eq!(b.fetch(&name("/ndn/s/a/1"), T).await.unwrap(), b"one");
        assert_eq!(mesh.stats().fetch_hits, 1);
    }

    #[tokio::test]
    async fn test_prefix_fetch_returns_newest() {
        let mesh = MemoryMesh::new();
        let a = mesh.attach(id(0));
        let b = mesh.attach(id(1));
        mesh.connect(&id(0), &id(1));

        a.advertise(name("/ndn/s/a/1"), b"one".to_vec()).await.unwrap();
        a.advertise(name("/ndn/s/a/2"), b"two".to_vec()).await.unwrap();
        assert_eq!(b.fetch(&name("/ndn/s/a"), T).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_no_multi_hop_and_no_self_fetch() {
        let mesh = MemoryMesh::new();
        let a = mesh.attach(id(0));
        let _b = mesh.attach(id(1));
        let c = mesh.attach(id(2));
        mesh.connect(&id(0), &id(1));
        mesh.connect(&id(1), &id(2));

        a.advertise(name("/ndn/s/a/1"), b"one".to_vec()).await.unwrap();
        assert!(matches!(
            c.fetch(&name("/ndn/s/a/1"), T).await,
            Err(FetchError::Timeout { .. })
        ));
        assert!(a.fetch(&name("/ndn/s/a/1"), T).await.is_err());
    }

    #[tokio::test]
    async fn test_discover_lists_newest_per_neighbor() {
        let mesh = MemoryMesh::new();
        let a = mesh.attach(id(0));
        let b = mesh.attach(id(1));
        let c = mesh.attach(id(2));
        mesh.connect(&id(1), &id(0));
        mesh.connect(&id(1), &id(2));

        a.advertise(name("/ndn/s/a/1"), vec![]).await.unwrap();
        a.advertise(name("/ndn/s/a/2"), vec![]).await.unwrap();
        c.advertise(name("/ndn/s/c/5"), vec![]).await.unwrap();
        c.advertise(name("/ndn/other/c/1"), vec![]).await.unwrap();

        let mut found = b.discover(&name("/ndn/s"), T).await.unwrap();
        found.sort();
        assert_eq!(found, vec![name("/ndn/s/a/2"), name("/ndn/s/c/5")]);
    }

    #[tokio::test]
    async fn test_disconnect_and_isolate() {
        let mesh = MemoryMesh::new();
        let a = mesh.attach(id(0));
        let b = mesh.attach(id(1));
        mesh.attach(id(2));
        mesh.connect(&id(0), &id(1));
        mesh.connect(&id(0), &id(2));

        a.advertise(name("/ndn/s/a/1"), vec![1]).await.unwrap();
        mesh.disconnect(&id(0), &id(1));
        assert!(b.fetch(&name("/ndn/s/a/1"), T).await.is_err());

        mesh.isolate(&id(0));
        assert!(mesh.neighbors(&id(0)).is_empty());
        assert!(mesh.neighbors(&id(2)).is_empty());
    }

    #[tokio::test]
    async fn test_total_loss_drops_everything() {
        let mesh = MemoryMesh::with_loss(1.0, 7);
        let a = mesh.attach(id(0));
        let b = mesh.attach(id(1));
        mesh.connect(&id(0), &id(1));

        a.advertise(name("/ndn/s/a/1"), vec![1]).await.unwrap();
        assert!(b.fetch(&name("/ndn/s/a/1"), T).await.is_err());
        assert!(b.discover(&name("/ndn/s"), T).await.unwrap().is_empty());
        assert_eq!(mesh.stats().dropped, 2);

        mesh.set_loss_probability(0.0);
        assert!(b.fetch(&name("/ndn/s/a/1"), T).await.is_ok());
    }

    #[tokio::test]
    async fn test_readvertise_replaces_object() {
        let mesh = MemoryMesh::new();
        let a = mesh.attach(id(0));
        let b = mesh.attach(id(1));
        mesh.connect(&id(0), &id(1));

        a.advertise(name("/ndn/s/a/1"), vec![1]).await.unwrap();
        mesh.inject(&id(0), name("/ndn/s/a/1"), vec![2]);
        assert_eq!(b.fetch(&name("/ndn/s/a/1"), T).await.unwrap(), vec![2]);
    }
}
