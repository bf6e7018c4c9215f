//! Headless Swarm Runner
//!
//! Runs the simulation at a fixed timestep, logging population summaries and
//! optionally dumping stats snapshots as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use swarm_core::config::DEFAULT_TUNING_PATH;
use swarm_core::output::write_stats_snapshot;
use swarm_core::{SimConfig, SimError, SimStats, Simulation};

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "swarm_sim")]
#[command(about = "Boid flocking with an epidemic, reproduction and doctors")]
struct Args {
    /// TOML tuning file (defaults to ./swarm.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed, overriding the config file
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Seconds per tick
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Interval between summaries (in ticks)
    #[arg(long, default_value_t = 60)]
    stats_every: u64,

    /// Directory for JSON stats snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(args: &Args) -> Result<SimConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::load_or_default(DEFAULT_TUNING_PATH),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn log_summary(stats: &SimStats) {
    info!(
        tick = stats.tick,
        normal = stats.alive.normal,
        doctor = stats.alive.doctor,
        antivax = stats.alive.antivax,
        infected = stats.infected,
        recovered = stats.recovered,
        births = stats.total_births.total(),
        deaths = stats.total_deaths.total(),
        cures = stats.total_cures,
        "Population"
    );
}

fn run(args: Args) -> Result<(), SimError> {
    let config = load_config(&args)?;
    let mut sim = Simulation::new(config)?;
    let stats_every = args.stats_every.max(1);

    info!(ticks = args.ticks, dt = args.dt, "Starting simulation");
    for _ in 0..args.ticks {
        let stats = sim.advance_tick(args.dt);
        if stats.tick % stats_every == 0 {
            log_summary(stats);
            if let Some(dir) = &args.snapshot_dir {
                let path = write_stats_snapshot(dir, stats)?;
                info!(path = %path.display(), "Wrote stats snapshot");
            }
        }
        if stats.population() == 0 {
            info!(tick = stats.tick, "Population extinct, stopping early");
            break;
        }
    }

    let stats = sim.stats();
    log_summary(stats);
    if let Some(dir) = &args.snapshot_dir {
        write_stats_snapshot(dir, stats)?;
    }
    info!(
        ticks = sim.tick(),
        elapsed = sim.elapsed(),
        "Simulation complete"
    );
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
