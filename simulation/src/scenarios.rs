//! Pre-defined NDVR scenarios
//!
//! Each scenario builds a simulation, drives it and prints progress the
//! way the `ndvr-sim` binary reports it.

use tracing::info;

use crate::simulation::{SimConfig, SimError, Simulation};
use crate::topology::{Topology, TopologyBuilder};

/// Run every configured round on `topology` and print the final tables
pub async fn run_convergence_scenario(
    topology: Topology,
    config: SimConfig,
) -> Result<Simulation, SimError> {
    info!(
        routers = topology.node_count(),
        links = topology.edge_count(),
        rounds = config.rounds,
        "=== Running convergence scenario ==="
    );
    println!("{}", topology.visualize());

    let mut sim = Simulation::new(topology, config)?;
    while sim.round() < sim.config().rounds {
        let summary = sim.step_round().await?;
        println!(
            "  round {}: {} routes changed{}",
            summary.round,
            summary.routes_changed,
            if summary.converged { ", converged" } else { "" }
        );
    }

    println!("\n--- Final routing tables ---");
    for node in sim.topology().nodes().collect::<Vec<_>>() {
        print!("{}", sim.describe_table(node));
    }
    println!("\n{}", sim.state_summary());
    Ok(sim)
}

/// Cut one ring link after convergence and watch routes move around it
///
/// ```text
/// 0 - 1 - 2 - ... - n-1 - 0     converge
/// 0   1 - 2 - ... - n-1 - 0     link 0-1 down, routes re-form the long way
/// ```
pub async fn run_link_failure_scenario(
    nodes: usize,
    config: SimConfig,
) -> Result<Simulation, SimError> {
    info!(nodes, "=== Running link failure scenario ===");
    let topology = TopologyBuilder::new(nodes).ring();
    let settle = u64::from(topology.diameter()) + 1;
    let mut sim = Simulation::new(topology, config)?;

    println!("\n--- Phase 1: ring converges ---");
    for _ in 0..settle {
        sim.step_round().await?;
    }
    println!("  {}", sim.state_summary());
    print!("{}", sim.describe_table(0));

    println!("\n--- Phase 2: link 0-1 fails ---");
    sim.fail_link(0, 1);
    let failed_at = sim.round();
    let mut recovered_at = None;
    while sim.round() < sim.config().rounds {
        let summary = sim.step_round().await?;
        if summary.converged && recovered_at.is_none() {
            recovered_at = Some(summary.round);
        }
    }

    match recovered_at {
        Some(round) => println!(
            "  Routes re-converged {} rounds after the failure",
            round - failed_at
        ),
        None => println!("  Routes did not re-converge before the last round"),
    }
    print!("{}", sim.describe_table(0));
    println!("  {}", sim.state_summary());
    Ok(sim)
}
