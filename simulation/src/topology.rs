//! Router topologies for NDVR simulations
//!
//! Provides builders for common shapes:
//! - Line: each router linked to its predecessor
//! - Ring: a line whose ends are joined
//! - Grid: routers laid out row by row, linked to horizontal and vertical neighbours
//! - Full mesh: every router linked to every other
//! - Star: router 0 in the centre
//! - Random: seeded link probability
//! - Custom: built from an edge list
//!
//! Node `i` runs as `RouterIdentity::from_ordinal(i)`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ndvr_core::{MemoryMesh, RouterIdentity};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// An undirected router topology over nodes `0..node_count`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    adjacency: BTreeMap<usize, BTreeSet<usize>>,
}

impl Topology {
    /// Create `count` unlinked nodes
    pub fn with_nodes(count: usize) -> Self {
        Self {
            adjacency: (0..count).map(|n| (n, BTreeSet::new())).collect(),
        }
    }

    /// Add a node with no links
    pub fn add_node(&mut self, node: usize) {
        self.adjacency.entry(node).or_default();
    }

    /// Add a bidirectional link
    pub fn connect(&mut self, a: usize, b: usize) {
        if a == b {
            return; // No self-loops
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    /// Remove a bidirectional link
    pub fn disconnect(&mut self, a: usize, b: usize) {
        if let Some(set) = self.adjacency.get_mut(&a) {
            set.remove(&b);
        }
        if let Some(set) = self.adjacency.get_mut(&b) {
            set.remove(&a);
        }
    }

    /// Neighbours of a node
    pub fn neighbors(&self, node: usize) -> Option<&BTreeSet<usize>> {
        self.adjacency.get(&node)
    }

    /// Check whether two nodes are directly linked
    pub fn are_connected(&self, a: usize, b: usize) -> bool {
        self.adjacency
            .get(&a)
            .is_some_and(|neighbors| neighbors.contains(&b))
    }

    /// All nodes, ascending
    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.adjacency.keys().copied()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of links
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Links as `(low, high)` pairs, ascending
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.adjacency
            .iter()
            .flat_map(|(&a, neighbors)| neighbors.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
            .collect()
    }

    /// Hop count from `from` to every node reachable from it, itself included
    pub fn hop_distances(&self, from: usize) -> BTreeMap<usize, u32> {
        let mut distances = BTreeMap::new();
        if !self.adjacency.contains_key(&from) {
            return distances;
        }
        distances.insert(from, 0);
        let mut queue = VecDeque::from([from]);
        while let Some(node) = queue.pop_front() {
            let next = distances[&node] + 1;
            for &neighbor in self.adjacency.get(&node).into_iter().flatten() {
                if !distances.contains_key(&neighbor) {
                    distances.insert(neighbor, next);
                    queue.push_back(neighbor);
                }
            }
        }
        distances
    }

    /// Longest shortest path between any two connected nodes
    pub fn diameter(&self) -> u32 {
        self.nodes()
            .filter_map(|n| self.hop_distances(n).into_values().max())
            .max()
            .unwrap_or(0)
    }

    /// Link the routers of this topology on a mesh
    pub fn wire(&self, mesh: &MemoryMesh) {
        for (a, b) in self.edges() {
            mesh.connect(&router(a), &router(b));
        }
    }

    /// Print a simple ASCII view of the topology
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Topology:\n");
        output.push_str(&format!("  Routers: {}\n", self.node_count()));
        output.push_str(&format!("  Links: {}\n\n", self.edge_count()));

        for (node, neighbors) in &self.adjacency {
            let neighbor_str: Vec<String> = neighbors.iter().map(|n| n.to_string()).collect();
            output.push_str(&format!("  {} -> [{}]\n", node, neighbor_str.join(", ")));
        }
        output
    }
}

/// Identity of the router running on `node`
pub fn router(node: usize) -> RouterIdentity {
    RouterIdentity::from_ordinal(node as u64)
}

/// Builder for common topologies
pub struct TopologyBuilder {
    nodes: usize,
}

impl TopologyBuilder {
    /// Create a builder for `nodes` routers
    pub fn new(nodes: usize) -> Self {
        Self { nodes }
    }

    /// 0 - 1 - 2 - ... - n-1
    pub fn line(self) -> Topology {
        let mut topology = Topology::with_nodes(self.nodes);
        for n in 1..self.nodes {
            topology.connect(n - 1, n);
        }
        topology
    }

    /// A line with its ends joined
    pub fn ring(self) -> Topology {
        let nodes = self.nodes;
        let mut topology = Self::new(nodes).line();
        if nodes > 2 {
            topology.connect(nodes - 1, 0);
        }
        topology
    }

    /// Rows of `width` routers; the last row may be short
    pub fn grid(self, width: usize) -> Topology {
        let width = width.max(1);
        let mut topology = Topology::with_nodes(self.nodes);
        for n in 0..self.nodes {
            if n % width != width - 1 && n + 1 < self.nodes {
                topology.connect(n, n + 1);
            }
            if n + width < self.nodes {
                topology.connect(n, n + width);
            }
        }
        topology
    }

    /// Every router linked to every other
    pub fn full_mesh(self) -> Topology {
        let mut topology = Topology::with_nodes(self.nodes);
        for a in 0..self.nodes {
            for b in (a + 1)..self.nodes {
                topology.connect(a, b);
            }
        }
        topology
    }

    /// Router 0 linked to every other
    pub fn star(self) -> Topology {
        let mut topology = Topology::with_nodes(self.nodes);
        for n in 1..self.nodes {
            topology.connect(0, n);
        }
        topology
    }

    /// Each pair linked with probability `probability`
    ///
    /// Routers left without links are attached to a random other router,
    /// so no router is isolated, though the graph may still be partitioned.
    pub fn random(self, probability: f64, seed: u64) -> Topology {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut topology = Topology::with_nodes(self.nodes);

        for a in 0..self.nodes {
            for b in (a + 1)..self.nodes {
                if rng.random::<f64>() < probability {
                    topology.connect(a, b);
                }
            }
        }

        if self.nodes > 1 {
            for n in 0..self.nodes {
                if topology.neighbors(n).is_some_and(BTreeSet::is_empty) {
                    let offset = rng.random_range(1..self.nodes);
                    topology.connect(n, (n + offset) % self.nodes);
                }
            }
        }
        topology
    }
}

/// Build a topology from an edge list
pub fn from_edges(edges: &[(usize, usize)]) -> Topology {
    let mut topology = Topology::default();
    for &(a, b) in edges {
        topology.add_node(a);
        topology.add_node(b);
        topology.connect(a, b);
    }
    topology
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_topology() {
        let topology = TopologyBuilder::new(4).line();
        assert_eq!(topology.node_count(), 4);
        assert_eq!(topology.edge_count(), 3);
        assert!(topology.are_connected(1, 2));
        assert!(!topology.are_connected(0, 3));
        assert_eq!(topology.diameter(), 3);
    }

    #[test]
    fn test_ring_topology() {
        let topology = TopologyBuilder::new(4).ring();
        assert_eq!(topology.edge_count(), 4); // 0-1, 1-2, 2-3, 3-0
        assert!(topology.are_connected(3, 0)); // Wrap around
        assert_eq!(topology.hop_distances(0)[&2], 2);
    }

    #[test]
    fn test_grid_topology() {
        // 0 1 2
        // 3 4 5
        // 6
        let topology = TopologyBuilder::new(7).grid(3);
        assert!(topology.are_connected(0, 1));
        assert!(!topology.are_connected(2, 3)); // Row break
        assert!(topology.are_connected(2, 5));
        assert!(topology.are_connected(3, 6));
        assert_eq!(topology.edge_count(), 8);
        assert_eq!(topology.hop_distances(0)[&5], 3);
    }

    #[test]
    fn test_full_mesh_and_star() {
        let full = TopologyBuilder::new(5).full_mesh();
        assert_eq!(full.edge_count(), 10); // C(5,2)
        assert_eq!(full.diameter(), 1);

        let star = TopologyBuilder::new(5).star();
        assert_eq!(star.edge_count(), 4);
        assert_eq!(star.hop_distances(1)[&4], 2);
    }

    #[test]
    fn test_random_is_seeded() {
        let a = TopologyBuilder::new(12).random(0.2, 7);
        let b = TopologyBuilder::new(12).random(0.2, 7);
        assert_eq!(a, b);
        for n in a.nodes() {
            assert!(!a.neighbors(n).unwrap().is_empty());
        }
    }

    #[test]
    fn test_partition_distances() {
        let topology = from_edges(&[(0, 1), (2, 3)]);
        let distances = topology.hop_distances(0);
        assert_eq!(distances.len(), 2);
        assert!(!distances.contains_key(&2));
        assert!(topology.hop_distances(9).is_empty());
    }

    #[test]
    fn test_wire_links_mesh() {
        let mesh = MemoryMesh::new();
        let topology = TopologyBuilder::new(3).line();
        for n in topology.nodes() {
            let _ = mesh.attach(router(n));
        }
        topology.wire(&mesh);
        assert_eq!(mesh.neighbors(&router(1)), vec![router(0), router(2)]);
        assert!(mesh.neighbors(&router(0)).contains(&router(1)));
    }
}
