//! NDVR simulator
//!
//! Runs a set of NDVR routers in lockstep over an in-memory mesh and
//! reports each router's table and when the mesh converged.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use ndvr_logging::{ConsoleFormat, FileConfig, NdvrSubscriberBuilder};
use ndvr_sync::{DEFAULT_FETCH_TIMEOUT, DEFAULT_ROUND_DURATION};

use ndvr_simulation::{SimConfig, Simulation, Topology, TopologyBuilder, scenarios};

#[derive(Parser)]
#[command(
    name = "ndvr-sim",
    about = "Distance-vector routing over named-data sync, simulated",
    version
)]
struct Cli {
    /// Number of routers
    #[arg(long, default_value_t = 20)]
    num_nodes: usize,

    /// Number of publish / sync rounds each router runs
    #[arg(long, default_value_t = 5)]
    sync_data_rounds: u64,

    /// Router topology
    #[arg(short, long, value_enum, default_value_t = TopologyKind::Grid)]
    topology: TopologyKind,

    /// Row width for the grid topology
    #[arg(long, default_value_t = 5)]
    width: usize,

    /// Link probability for the random topology
    #[arg(long, default_value_t = 0.2)]
    link_probability: f64,

    /// Probability each mesh response is lost
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// Evict routes not refreshed within this many rounds
    #[arg(long)]
    stale_after_rounds: Option<u64>,

    /// Run number, seeds keys, loss and random topologies
    #[arg(long, default_value_t = 0)]
    run: u64,

    /// Scenario to play
    #[arg(short, long, value_enum, default_value_t = Scenario::Converge)]
    scenario: Scenario,

    /// Write the trust anchor certificate here
    #[arg(long)]
    trust_anchor: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long)]
    json_logs: bool,

    /// Also write JSONL logs to <DIR>/ndvr-run<RUN>.log
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TopologyKind {
    Line,
    Ring,
    Grid,
    Full,
    Star,
    Random,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// Run all rounds and print the final tables
    Converge,
    /// Converge on a ring, then cut one link
    LinkFailure,
}

impl Cli {
    fn topology(&self) -> Topology {
        let builder = TopologyBuilder::new(self.num_nodes);
        match self.topology {
            TopologyKind::Line => builder.line(),
            TopologyKind::Ring => builder.ring(),
            TopologyKind::Grid => builder.grid(self.width),
            TopologyKind::Full => builder.full_mesh(),
            TopologyKind::Star => builder.star(),
            TopologyKind::Random => builder.random(self.link_probability, self.run),
        }
    }

    fn sim_config(&self) -> SimConfig {
        SimConfig {
            rounds: self.sync_data_rounds,
            round_duration: DEFAULT_ROUND_DURATION,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            loss: self.loss,
            seed: self.run,
            stale_after_rounds: self.stale_after_rounds,
        }
    }

    fn logging(&self) -> NdvrSubscriberBuilder {
        let console = if self.json_logs {
            ConsoleFormat::Jsonl
        } else {
            ConsoleFormat::Pretty
        };
        let mut builder = NdvrSubscriberBuilder::new()
            .with_console(console)
            .with_level(if self.verbose { "debug" } else { "info" })
            .with_location(self.verbose);
        if let Some(dir) = &self.log_dir {
            builder = builder.with_file_output(FileConfig::for_run(dir, self.run));
        }
        builder
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = cli
        .logging()
        .try_init()
        .context("failed to set up logging")?;

    let started = std::time::Instant::now();
    let sim = match cli.scenario {
        Scenario::Converge => {
            scenarios::run_convergence_scenario(cli.topology(), cli.sim_config()).await?
        }
        Scenario::LinkFailure => {
            scenarios::run_link_failure_scenario(cli.num_nodes, cli.sim_config()).await?
        }
    };

    if let Some(path) = &cli.trust_anchor {
        sim.anchor()
            .save_to(path)
            .with_context(|| format!("failed to write trust anchor to {}", path.display()))?;
        println!("Trust anchor written to {}", path.display());
    }

    print_stats(&sim, started.elapsed());
    Ok(())
}

fn print_stats(sim: &Simulation, elapsed: Duration) {
    let stats = &sim.stats;
    println!("\n=== Summary ===");
    println!("  Rounds run: {}", stats.rounds_run);
    println!("  Publications: {}", stats.publications);
    println!("  Objects merged: {}", stats.objects_merged);
    println!("  Routes changed: {}", stats.routes_changed);
    println!("  Stale objects skipped: {}", stats.stale_objects);
    println!("  Trust rejections: {}", stats.trust_rejections);
    println!("  Decode errors: {}", stats.decode_errors);
    println!("  Fetch timeouts: {}", stats.fetch_timeouts);
    println!("  Routes evicted: {}", stats.routes_evicted);
    println!(
        "  Mesh: {} advertised, {} hits, {} misses, {} dropped",
        stats.mesh.advertised, stats.mesh.fetch_hits, stats.mesh.fetch_misses, stats.mesh.dropped
    );
    match stats.converged_at {
        Some(round) => println!("  Converged after round {round}"),
        None => println!("  Did not converge within {} rounds", stats.rounds_run),
    }
    println!("  Wall time: {:.2?}", elapsed);
}
