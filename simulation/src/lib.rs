//! # NDVR Simulation
//!
//! Runs many NDVR routers side by side over an in-memory mesh to watch
//! distance-vector state converge.
//!
//! - **Topology** (`topology.rs`): line, ring, grid, full mesh, star, random and custom shapes
//! - **Simulation** (`simulation.rs`): lockstep rounds, convergence checks, link failures
//! - **Scenarios** (`scenarios.rs`): pre-built runs used by the `ndvr-sim` binary
//!
//! ```rust,ignore
//! use ndvr_simulation::*;
//!
//! let mut sim = Simulation::new(TopologyBuilder::new(3).line(), SimConfig::default())?;
//! sim.step_round().await?;
//! sim.step_round().await?;
//! assert!(sim.converged());
//! ```

pub mod scenarios;
pub mod simulation;
pub mod topology;

pub use simulation::{NETWORK, RoundSummary, SimConfig, SimEngine, SimError, SimStats, Simulation};
pub use topology::{Topology, TopologyBuilder, from_edges, router};
